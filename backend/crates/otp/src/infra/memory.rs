//! In-Memory Repository
//!
//! Mutex-guarded maps with the same per-identity atomicity as the SQL in
//! `postgres.rs`. Used by tests and for running without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use platform::rate_limit::{RateLimitConfig, RateLimitDecision};

use crate::domain::entities::{CodeCheck, OtpRecord, VerifyOutcome};
use crate::domain::repository::{OtpRecordRepository, OtpSendLogRepository};
use crate::error::OtpResult;

#[derive(Default)]
struct MemoryState {
    records: HashMap<String, OtpRecord>,
    /// Identity -> send timestamps (ms), oldest first
    sends: HashMap<String, Vec<i64>>,
}

#[derive(Clone, Default)]
pub struct MemoryOtpRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryOtpRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, identity: &str) -> Option<OtpRecord> {
        self.state().records.get(identity).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.state().records.len()
    }

    pub fn send_attempts(&self, identity: &str) -> usize {
        self.state().sends.get(identity).map_or(0, Vec::len)
    }

    /// Move a stored code's expiry, e.g. into the past
    pub fn set_expiry(&self, identity: &str, expires_at_ms: i64) {
        if let Some(record) = self.state().records.get_mut(identity) {
            record.expires_at_ms = expires_at_ms;
        }
    }

    /// Shift every logged send back in time
    pub fn age_send_attempts(&self, by: Duration) {
        let by_ms = by.as_millis() as i64;
        for times in self.state().sends.values_mut() {
            times.iter_mut().for_each(|t| *t -= by_ms);
        }
    }
}

impl OtpSendLogRepository for MemoryOtpRepository {
    async fn reserve_send(
        &self,
        identity: &str,
        limit: &RateLimitConfig,
        now_ms: i64,
    ) -> OtpResult<RateLimitDecision> {
        let window_start = now_ms - limit.window.as_millis() as i64;
        let mut state = self.state();
        let times = state.sends.entry(identity.to_string()).or_default();

        let in_window: Vec<i64> = times.iter().copied().filter(|t| *t > window_start).collect();
        let oldest_age = in_window
            .iter()
            .min()
            .map(|oldest| Duration::from_millis((now_ms - oldest).max(0) as u64));

        let decision = limit.decide(in_window.len() as u32, oldest_age);
        if decision.allowed {
            times.push(now_ms);
        }
        Ok(decision)
    }

    async fn delete_send_attempts_before(&self, cutoff_ms: i64) -> OtpResult<u64> {
        let mut state = self.state();
        let mut deleted = 0u64;
        for times in state.sends.values_mut() {
            let before = times.len();
            times.retain(|t| *t >= cutoff_ms);
            deleted += (before - times.len()) as u64;
        }
        state.sends.retain(|_, times| !times.is_empty());
        Ok(deleted)
    }
}

impl OtpRecordRepository for MemoryOtpRepository {
    async fn upsert_otp(&self, record: &OtpRecord) -> OtpResult<()> {
        self.state()
            .records
            .insert(record.identity.clone(), record.clone());
        Ok(())
    }

    async fn verify_otp(
        &self,
        identity: &str,
        code_hash: &str,
        now_ms: i64,
        max_attempts: u32,
    ) -> OtpResult<VerifyOutcome> {
        let mut state = self.state();
        let Some(record) = state.records.get_mut(identity) else {
            return Ok(VerifyOutcome::NoActiveOtp);
        };

        Ok(match record.check(code_hash, now_ms) {
            CodeCheck::Valid => {
                state.records.remove(identity);
                VerifyOutcome::Verified
            }
            CodeCheck::Expired => VerifyOutcome::Expired,
            CodeCheck::Mismatch => {
                record.failed_attempts += 1;
                let discarded = record.failed_attempts >= max_attempts;
                if discarded {
                    state.records.remove(identity);
                }
                VerifyOutcome::Mismatch { discarded }
            }
        })
    }

    async fn delete_expired_otps(&self, now_ms: i64) -> OtpResult<u64> {
        let mut state = self.state();
        let before = state.records.len();
        state.records.retain(|_, record| !record.is_expired(now_ms));
        Ok((before - state.records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::identity::{Identity, Phone};

    const PHONE: &str = "+15550100000";

    fn record(hash: &str) -> OtpRecord {
        OtpRecord::new(&Identity::Phone(Phone::new(PHONE).unwrap()), hash.into(), 60_000)
    }

    #[tokio::test]
    async fn test_reserve_send_stops_at_limit() {
        let repo = MemoryOtpRepository::new();
        let limit = RateLimitConfig::new(2, 60);
        let now = 1_000_000;

        assert!(repo.reserve_send(PHONE, &limit, now).await.unwrap().allowed);
        assert!(repo.reserve_send(PHONE, &limit, now + 1_000).await.unwrap().allowed);

        let denied = repo.reserve_send(PHONE, &limit, now + 2_000).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_secs(), Some(58));
        // Denied sends are not logged
        assert_eq!(repo.send_attempts(PHONE), 2);

        // Oldest send has left the window
        assert!(repo.reserve_send(PHONE, &limit, now + 60_001).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_verify_consumes_once() {
        let repo = MemoryOtpRepository::new();
        let r = record("h");
        let now = r.created_at.timestamp_millis();
        repo.upsert_otp(&r).await.unwrap();

        assert_eq!(repo.verify_otp(PHONE, "h", now, 5).await.unwrap(), VerifyOutcome::Verified);
        assert_eq!(repo.verify_otp(PHONE, "h", now, 5).await.unwrap(), VerifyOutcome::NoActiveOtp);
    }

    #[tokio::test]
    async fn test_mismatch_budget() {
        let repo = MemoryOtpRepository::new();
        let r = record("h");
        let now = r.created_at.timestamp_millis();
        repo.upsert_otp(&r).await.unwrap();

        assert_eq!(
            repo.verify_otp(PHONE, "x", now, 2).await.unwrap(),
            VerifyOutcome::Mismatch { discarded: false }
        );
        assert_eq!(
            repo.verify_otp(PHONE, "x", now, 2).await.unwrap(),
            VerifyOutcome::Mismatch { discarded: true }
        );
        assert!(repo.record(PHONE).is_none());
    }

    #[tokio::test]
    async fn test_newer_code_replaces_older() {
        let repo = MemoryOtpRepository::new();
        let first = record("first");
        let now = first.created_at.timestamp_millis();
        repo.upsert_otp(&first).await.unwrap();
        repo.upsert_otp(&record("second")).await.unwrap();

        assert_eq!(
            repo.verify_otp(PHONE, "first", now, 5).await.unwrap(),
            VerifyOutcome::Mismatch { discarded: false }
        );
        assert_eq!(repo.verify_otp(PHONE, "second", now, 5).await.unwrap(), VerifyOutcome::Verified);
    }
}
