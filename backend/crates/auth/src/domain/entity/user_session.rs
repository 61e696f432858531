//! User Session Entity
//!
//! One row per live refresh token. The refresh token itself never leaves
//! the use case that minted it; only its SHA-256 digest is kept here.

use chrono::{DateTime, Duration, Utc};
use kernel::id::{SessionId, UserId};
use platform::client::ClientInfo;

/// User session entity
#[derive(Debug, Clone)]
pub struct UserSession {
    pub session_id: SessionId,
    pub user_id: UserId,
    /// SHA-256 hex of the current refresh token
    pub refresh_token_hash: String,
    pub device_type: String,
    pub browser: String,
    pub os: String,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    /// Absolute expiry (Unix timestamp ms); rotation does not extend it
    pub expires_at_ms: i64,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl UserSession {
    /// Create a new session
    ///
    /// TTL is provided by the application layer (config), not hard-coded here.
    pub fn new(
        user_id: UserId,
        refresh_token_hash: String,
        client: &ClientInfo,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            session_id: SessionId::new(),
            user_id,
            refresh_token_hash,
            device_type: client.device.device_type.clone(),
            browser: client.device.browser.clone(),
            os: client.device.os.clone(),
            client_ip: client.ip_string(),
            user_agent: client.user_agent.clone(),
            expires_at_ms: (now + ttl).timestamp_millis(),
            created_at: now,
            last_activity_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp_millis() >= self.expires_at_ms
    }
}

/// Result of an atomic refresh-token rotation
#[derive(Debug, Clone)]
pub enum RotateOutcome {
    /// The presented token was current; the session now holds the new one
    Rotated(UserSession),
    /// The presented token had already been rotated; the session was revoked
    Reused { session_id: SessionId, user_id: UserId },
    /// Unknown token or session past its expiry
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation_captures_device() {
        let client = ClientInfo::new(
            Some("203.0.113.7".parse().unwrap()),
            Some("Mozilla/5.0 (Windows NT 10.0) Firefox/121.0".to_string()),
        );
        let session = UserSession::new(UserId::new(), "hash".into(), &client, Duration::days(30));

        assert_eq!(session.browser, "Firefox");
        assert_eq!(session.os, "Windows");
        assert_eq!(session.client_ip.as_deref(), Some("203.0.113.7"));
        assert!(!session.is_expired());
    }

    #[test]
    fn test_session_expiry() {
        let client = ClientInfo::new(None, None);
        let session = UserSession::new(UserId::new(), "hash".into(), &client, Duration::zero());
        assert!(session.is_expired());
        assert_eq!(session.device_type, "unknown");
    }
}
