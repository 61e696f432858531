//! PostgreSQL Repository Implementation

use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::id::OtpRecordId;
use platform::notify::Channel;
use platform::rate_limit::{RateLimitConfig, RateLimitDecision};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::{CodeCheck, OtpRecord, VerifyOutcome};
use crate::domain::repository::{OtpRecordRepository, OtpSendLogRepository};
use crate::error::{OtpError, OtpResult};

/// PostgreSQL-backed OTP repository
#[derive(Clone)]
pub struct PgOtpRepository {
    pool: PgPool,
}

impl PgOtpRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl OtpSendLogRepository for PgOtpRepository {
    async fn reserve_send(
        &self,
        identity: &str,
        limit: &RateLimitConfig,
        now_ms: i64,
    ) -> OtpResult<RateLimitDecision> {
        let window_start = now_ms - limit.window.as_millis() as i64;
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent sends for one identity until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(identity)
            .execute(&mut *tx)
            .await?;

        let (count, oldest) = sqlx::query_as::<_, (i64, Option<i64>)>(
            r#"
            SELECT COUNT(*), MIN(attempted_at_ms)
            FROM otp_send_attempts
            WHERE identity = $1 AND attempted_at_ms > $2
            "#,
        )
        .bind(identity)
        .bind(window_start)
        .fetch_one(&mut *tx)
        .await?;

        let oldest_age = oldest.map(|t| Duration::from_millis((now_ms - t).max(0) as u64));
        let decision = limit.decide(count as u32, oldest_age);

        if decision.allowed {
            sqlx::query(
                r#"
                INSERT INTO otp_send_attempts (identity, user_id, attempted_at_ms)
                VALUES (
                    $1,
                    (SELECT user_id FROM users WHERE email = $1 OR phone = $1 LIMIT 1),
                    $2
                )
                "#,
            )
            .bind(identity)
            .bind(now_ms)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(decision)
    }

    async fn delete_send_attempts_before(&self, cutoff_ms: i64) -> OtpResult<u64> {
        let result = sqlx::query("DELETE FROM otp_send_attempts WHERE attempted_at_ms < $1")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

impl OtpRecordRepository for PgOtpRepository {
    async fn upsert_otp(&self, record: &OtpRecord) -> OtpResult<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_records (
                otp_id, identity, channel, code_hash, failed_attempts, expires_at_ms, created_at
            ) VALUES ($1, $2, $3, $4, 0, $5, $6)
            ON CONFLICT (identity) DO UPDATE SET
                otp_id = EXCLUDED.otp_id,
                channel = EXCLUDED.channel,
                code_hash = EXCLUDED.code_hash,
                failed_attempts = 0,
                expires_at_ms = EXCLUDED.expires_at_ms,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(record.otp_id.as_uuid())
        .bind(&record.identity)
        .bind(record.channel.to_string())
        .bind(&record.code_hash)
        .bind(record.expires_at_ms)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn verify_otp(
        &self,
        identity: &str,
        code_hash: &str,
        now_ms: i64,
        max_attempts: u32,
    ) -> OtpResult<VerifyOutcome> {
        let mut tx = self.pool.begin().await?;

        // Row lock: a concurrent verify of the same code waits and then
        // finds the record gone
        let row = sqlx::query_as::<_, OtpRow>(
            r#"
            SELECT otp_id, identity, channel, code_hash, failed_attempts, expires_at_ms, created_at
            FROM otp_records
            WHERE identity = $1
            FOR UPDATE
            "#,
        )
        .bind(identity)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(VerifyOutcome::NoActiveOtp);
        };
        let record = row.into_record()?;

        let outcome = match record.check(code_hash, now_ms) {
            CodeCheck::Valid => {
                sqlx::query("DELETE FROM otp_records WHERE otp_id = $1")
                    .bind(record.otp_id.as_uuid())
                    .execute(&mut *tx)
                    .await?;
                VerifyOutcome::Verified
            }
            CodeCheck::Expired => VerifyOutcome::Expired,
            CodeCheck::Mismatch => {
                let discarded = record.failed_attempts + 1 >= max_attempts;
                if discarded {
                    sqlx::query("DELETE FROM otp_records WHERE otp_id = $1")
                        .bind(record.otp_id.as_uuid())
                        .execute(&mut *tx)
                        .await?;
                } else {
                    sqlx::query(
                        "UPDATE otp_records SET failed_attempts = failed_attempts + 1 WHERE otp_id = $1",
                    )
                    .bind(record.otp_id.as_uuid())
                    .execute(&mut *tx)
                    .await?;
                }
                VerifyOutcome::Mismatch { discarded }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn delete_expired_otps(&self, now_ms: i64) -> OtpResult<u64> {
        let result = sqlx::query("DELETE FROM otp_records WHERE expires_at_ms <= $1")
            .bind(now_ms)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct OtpRow {
    otp_id: Uuid,
    identity: String,
    channel: String,
    code_hash: String,
    failed_attempts: i32,
    expires_at_ms: i64,
    created_at: DateTime<Utc>,
}

impl OtpRow {
    fn into_record(self) -> OtpResult<OtpRecord> {
        let channel = match self.channel.as_str() {
            "sms" => Channel::Sms,
            "email" => Channel::Email,
            other => return Err(OtpError::Internal(format!("Unknown OTP channel: {other}"))),
        };

        Ok(OtpRecord {
            otp_id: OtpRecordId::from_uuid(self.otp_id),
            identity: self.identity,
            channel,
            code_hash: self.code_hash,
            failed_attempts: self.failed_attempts.max(0) as u32,
            expires_at_ms: self.expires_at_ms,
            created_at: self.created_at,
        })
    }
}
