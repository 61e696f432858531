//! Repository Traits

use platform::rate_limit::{RateLimitConfig, RateLimitDecision};

use crate::domain::entities::{OtpRecord, VerifyOutcome};
use crate::error::OtpResult;

/// Send log used for the rolling rate limit
#[trait_variant::make(OtpSendLogRepository: Send)]
pub trait LocalOtpSendLogRepository {
    /// Count sends for the identity inside the window and, when the limit
    /// allows it, log this one. Check and insert are one atomic step.
    async fn reserve_send(
        &self,
        identity: &str,
        limit: &RateLimitConfig,
        now_ms: i64,
    ) -> OtpResult<RateLimitDecision>;

    /// Drop send log entries older than the cutoff
    async fn delete_send_attempts_before(&self, cutoff_ms: i64) -> OtpResult<u64>;
}

/// Outstanding codes
#[trait_variant::make(OtpRecordRepository: Send)]
pub trait LocalOtpRecordRepository {
    /// Store the record, replacing any earlier one for the same identity
    async fn upsert_otp(&self, record: &OtpRecord) -> OtpResult<()>;

    /// Check a code digest under a row lock. A match deletes the record; a
    /// mismatch counts against `max_attempts` and deletes it when spent.
    async fn verify_otp(
        &self,
        identity: &str,
        code_hash: &str,
        now_ms: i64,
        max_attempts: u32,
    ) -> OtpResult<VerifyOutcome>;

    async fn delete_expired_otps(&self, now_ms: i64) -> OtpResult<u64>;
}

/// Everything the OTP service needs from storage
pub trait OtpStore:
    OtpSendLogRepository + OtpRecordRepository + Clone + Send + Sync + 'static
{
}

impl<T> OtpStore for T where
    T: OtpSendLogRepository + OtpRecordRepository + Clone + Send + Sync + 'static
{
}
