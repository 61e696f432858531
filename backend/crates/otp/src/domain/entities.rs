//! Domain Entities

use chrono::{DateTime, Utc};
use kernel::id::OtpRecordId;
use kernel::identity::Identity;
use platform::crypto::constant_time_eq;
use platform::notify::Channel;

/// Outstanding one-time code for an identity
///
/// At most one exists per identity; a new send replaces it.
#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub otp_id: OtpRecordId,
    /// Normalized phone or e-mail
    pub identity: String,
    pub channel: Channel,
    /// SHA-256 hex of the code, see [`hash_code`](super::services::hash_code)
    pub code_hash: String,
    pub failed_attempts: u32,
    /// Unix timestamp ms
    pub expires_at_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn new(identity: &Identity, code_hash: String, ttl_ms: i64) -> Self {
        let now = Utc::now();
        Self {
            otp_id: OtpRecordId::new(),
            identity: identity.as_str().to_string(),
            channel: channel_for(identity),
            code_hash,
            failed_attempts: 0,
            expires_at_ms: now.timestamp_millis() + ttl_ms,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Compare a submitted code digest against this record
    pub fn check(&self, code_hash: &str, now_ms: i64) -> CodeCheck {
        if self.is_expired(now_ms) {
            CodeCheck::Expired
        } else if constant_time_eq(self.code_hash.as_bytes(), code_hash.as_bytes()) {
            CodeCheck::Valid
        } else {
            CodeCheck::Mismatch
        }
    }
}

/// Delivery channel implied by the identity kind
pub fn channel_for(identity: &Identity) -> Channel {
    match identity {
        Identity::Email(_) => Channel::Email,
        Identity::Phone(_) => Channel::Sms,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Valid,
    Expired,
    Mismatch,
}

/// Result of an atomic verify-and-consume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Code matched; the record is gone
    Verified,
    NoActiveOtp,
    Expired,
    /// Wrong code; `discarded` once the attempt budget is spent
    Mismatch { discarded: bool },
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::identity::{Email, Phone};

    #[test]
    fn test_channel_follows_identity() {
        let email = Identity::Email(Email::new("a@example.com").unwrap());
        let phone = Identity::Phone(Phone::new("+15550100000").unwrap());
        assert_eq!(channel_for(&email), Channel::Email);
        assert_eq!(channel_for(&phone), Channel::Sms);
    }

    #[test]
    fn test_check_order() {
        let phone = Identity::Phone(Phone::new("5550100000").unwrap());
        let record = OtpRecord::new(&phone, "abc".into(), 1_000);
        let now = record.created_at.timestamp_millis();

        assert_eq!(record.check("abc", now), CodeCheck::Valid);
        assert_eq!(record.check("abd", now), CodeCheck::Mismatch);
        // Expiry wins even for the right code
        assert_eq!(record.check("abc", record.expires_at_ms), CodeCheck::Expired);
    }
}
