//! Verify OTP Use Case

use std::sync::Arc;

use kernel::identity::Identity;

use crate::application::config::OtpConfig;
use crate::domain::entities::VerifyOutcome;
use crate::domain::repository::OtpRecordRepository;
use crate::domain::services::{hash_code, is_well_formed};
use crate::error::{OtpError, OtpResult};

pub struct VerifyOtpUseCase<R>
where
    R: OtpRecordRepository,
{
    repo: Arc<R>,
    config: Arc<OtpConfig>,
}

impl<R> VerifyOtpUseCase<R>
where
    R: OtpRecordRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, config: Arc<OtpConfig>) -> Self {
        Self { repo, config }
    }

    /// Succeeds at most once per issued code
    pub async fn execute(&self, identity: &str, code: &str) -> OtpResult<()> {
        let identity = Identity::parse(identity)?;
        let code = code.trim();
        if !is_well_formed(code, self.config.code_length) {
            return Err(OtpError::Validation(format!(
                "code must be {} digits",
                self.config.code_length
            )));
        }

        let outcome = self
            .repo
            .verify_otp(
                identity.as_str(),
                &hash_code(identity.as_str(), code),
                chrono::Utc::now().timestamp_millis(),
                self.config.max_verify_attempts,
            )
            .await?;

        match outcome {
            VerifyOutcome::Verified => {
                tracing::info!(kind = identity.kind(), "OTP verified");
                Ok(())
            }
            VerifyOutcome::NoActiveOtp => Err(OtpError::NoActiveOtp),
            VerifyOutcome::Expired => Err(OtpError::Expired),
            VerifyOutcome::Mismatch { discarded } => {
                if discarded {
                    tracing::warn!(kind = identity.kind(), "OTP discarded after too many wrong codes");
                }
                Err(OtpError::Mismatch)
            }
        }
    }
}
