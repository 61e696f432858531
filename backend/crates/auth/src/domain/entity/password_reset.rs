//! Password Reset Token

use chrono::{DateTime, Duration, Utc};
use kernel::id::UserId;

#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub user_id: UserId,
    /// SHA-256 hex of the emailed token
    pub token_hash: String,
    /// Unix timestamp ms
    pub expires_at_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn new(user_id: UserId, token_hash: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            token_hash,
            expires_at_ms: (now + ttl).timestamp_millis(),
            created_at: now,
        }
    }
}
