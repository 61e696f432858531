//! Failed Login Attempt Counter

use kernel::id::UserId;

/// Per-key failure counter
///
/// Keyed by the user when the identity resolves to one, otherwise by the
/// raw identity, so a user has at most one row however they log in.
#[derive(Debug, Clone)]
pub struct FailedAttempt {
    pub lockout_key: String,
    pub user_id: Option<UserId>,
    pub identity: String,
    pub attempt_count: u32,
    /// Unix timestamp ms
    pub last_attempt_at_ms: i64,
}

impl FailedAttempt {
    /// Lockout key for an attempt
    pub fn key_for(user_id: Option<&UserId>, identity: &str) -> String {
        match user_id {
            Some(id) => format!("user:{id}"),
            None => format!("identity:{identity}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefers_user() {
        let id = UserId::new();
        assert_eq!(
            FailedAttempt::key_for(Some(&id), "a@example.com"),
            format!("user:{id}")
        );
        assert_eq!(
            FailedAttempt::key_for(None, "a@example.com"),
            "identity:a@example.com"
        );
    }
}
