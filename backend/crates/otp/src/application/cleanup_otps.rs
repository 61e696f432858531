//! Cleanup Use Case
//!
//! Storage hygiene only; verification never depends on it.

use std::sync::Arc;

use crate::application::config::OtpConfig;
use crate::domain::repository::{OtpRecordRepository, OtpSendLogRepository};
use crate::error::OtpResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub expired_codes: u64,
    /// Send log entries that fell out of the rate-limit window
    pub stale_send_attempts: u64,
}

pub struct CleanupOtpUseCase<R>
where
    R: OtpRecordRepository + OtpSendLogRepository,
{
    repo: Arc<R>,
    config: Arc<OtpConfig>,
}

impl<R> CleanupOtpUseCase<R>
where
    R: OtpRecordRepository + OtpSendLogRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, config: Arc<OtpConfig>) -> Self {
        Self { repo, config }
    }

    pub async fn execute(&self) -> OtpResult<CleanupReport> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let window_ms = self.config.send_limit.window.as_millis() as i64;

        let expired_codes = self.repo.delete_expired_otps(now_ms).await?;
        let stale_send_attempts = self
            .repo
            .delete_send_attempts_before(now_ms - window_ms)
            .await?;

        tracing::info!(expired_codes, stale_send_attempts, "Cleaned up OTP data");

        Ok(CleanupReport {
            expired_codes,
            stale_send_attempts,
        })
    }
}
