//! Send OTP Use Case
//!
//! Rate-limited issuance: the send log is checked and appended atomically,
//! then the code is delivered, and only an accepted delivery stores it.

use std::sync::Arc;

use kernel::identity::{Email, Identity, Phone};
use platform::notify::{Channel, Notification, Notifier};

use crate::application::config::OtpConfig;
use crate::domain::entities::OtpRecord;
use crate::domain::repository::{OtpRecordRepository, OtpSendLogRepository};
use crate::domain::services::{generate_otp, hash_code};
use crate::error::{OtpError, OtpResult};

/// Exactly one of `phone` / `email`
#[derive(Debug, Clone, Default)]
pub struct SendOtpInput {
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl SendOtpInput {
    pub fn phone(phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            email: None,
        }
    }

    pub fn email(email: impl Into<String>) -> Self {
        Self {
            phone: None,
            email: Some(email.into()),
        }
    }

    pub fn identity(&self) -> OtpResult<Identity> {
        resolve_identity(self.phone.as_deref(), self.email.as_deref())
    }
}

/// Parse a request naming exactly one of phone / email
pub fn resolve_identity(phone: Option<&str>, email: Option<&str>) -> OtpResult<Identity> {
    match (non_blank(phone), non_blank(email)) {
        (Some(phone), None) => Ok(Identity::Phone(Phone::new(phone)?)),
        (None, Some(email)) => Ok(Identity::Email(Email::new(email)?)),
        (Some(_), Some(_)) => Err(OtpError::Validation(
            "provide either phone or email, not both".into(),
        )),
        (None, None) => Err(OtpError::Validation("phone or email is required".into())),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct SendOtpOutput {
    pub identity: String,
    pub channel: Channel,
    pub expires_at_ms: i64,
    /// Sends left in the current window
    pub remaining_sends: u32,
}

pub struct SendOtpUseCase<R, N>
where
    R: OtpSendLogRepository + OtpRecordRepository,
    N: Notifier,
{
    repo: Arc<R>,
    notifier: Arc<N>,
    config: Arc<OtpConfig>,
}

impl<R, N> SendOtpUseCase<R, N>
where
    R: OtpSendLogRepository + OtpRecordRepository + Send + Sync,
    N: Notifier + Send + Sync,
{
    pub fn new(repo: Arc<R>, notifier: Arc<N>, config: Arc<OtpConfig>) -> Self {
        Self {
            repo,
            notifier,
            config,
        }
    }

    pub async fn execute(&self, input: SendOtpInput) -> OtpResult<SendOtpOutput> {
        let identity = input.identity()?;
        let now_ms = chrono::Utc::now().timestamp_millis();

        let decision = self
            .repo
            .reserve_send(identity.as_str(), &self.config.send_limit, now_ms)
            .await?;
        if !decision.allowed {
            return Err(OtpError::RateLimited {
                retry_after_secs: decision.retry_after_secs().unwrap_or(1),
            });
        }

        let code = generate_otp(self.config.code_length);
        let record = OtpRecord::new(
            &identity,
            hash_code(identity.as_str(), &code),
            self.config.ttl_ms(),
        );

        self.deliver(&identity, message(&record, &code, &self.config))
            .await?;
        self.repo.upsert_otp(&record).await?;

        tracing::info!(
            channel = %record.channel,
            kind = identity.kind(),
            remaining = decision.remaining,
            "OTP sent"
        );

        Ok(SendOtpOutput {
            identity: record.identity,
            channel: record.channel,
            expires_at_ms: record.expires_at_ms,
            remaining_sends: decision.remaining,
        })
    }

    async fn deliver(&self, identity: &Identity, notification: Notification) -> OtpResult<()> {
        match tokio::time::timeout(self.config.notify_timeout, self.notifier.deliver(&notification))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, kind = identity.kind(), "OTP delivery failed");
                Err(OtpError::ProviderUnavailable)
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.notify_timeout.as_millis() as u64,
                    kind = identity.kind(),
                    "OTP delivery timed out"
                );
                Err(OtpError::ProviderUnavailable)
            }
        }
    }
}

fn message(record: &OtpRecord, code: &str, config: &OtpConfig) -> Notification {
    let minutes = (config.ttl.as_secs() / 60).max(1);
    let body = format!("Your verification code is {code}. It expires in {minutes} minutes.");

    match record.channel {
        Channel::Sms => Notification::sms(&record.identity, body),
        Channel::Email => Notification::email(&record.identity, "Your verification code", body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_requires_exactly_one_identity() {
        assert!(matches!(
            SendOtpInput::default().identity(),
            Err(OtpError::Validation(_))
        ));
        assert!(matches!(
            SendOtpInput {
                phone: Some("+15550100000".into()),
                email: Some("a@example.com".into()),
            }
            .identity(),
            Err(OtpError::Validation(_))
        ));

        let phone = SendOtpInput {
            phone: Some("+1 (555) 010-0000".into()),
            email: Some("   ".into()),
        };
        assert_eq!(phone.identity().unwrap().as_str(), "+15550100000");

        let email = SendOtpInput::email(" Someone@Example.com ");
        assert_eq!(email.identity().unwrap().as_str(), "someone@example.com");
    }

    #[test]
    fn test_invalid_phone_is_validation_error() {
        assert!(matches!(
            SendOtpInput::phone("call me").identity(),
            Err(OtpError::Validation(_))
        ));
    }

    #[test]
    fn test_message_matches_channel() {
        let identity = Identity::Email(Email::new("a@example.com").unwrap());
        let record = OtpRecord::new(&identity, "x".into(), 300_000);
        let n = message(&record, "123456", &OtpConfig::default());

        assert_eq!(n.channel, Channel::Email);
        assert!(n.subject.is_some());
        assert!(n.body.contains("123456"));
        assert!(n.body.contains("5 minutes"));
    }
}
