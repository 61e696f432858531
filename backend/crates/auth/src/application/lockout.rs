//! Lockout Guard
//!
//! Counts failed sign-ins per lockout key and refuses attempts once the
//! threshold is reached, until the cool-down since the last failure elapses.

use std::sync::Arc;

use chrono::Utc;
use kernel::id::UserId;

use crate::application::config::LockoutPolicy;
use crate::domain::entity::failed_attempt::FailedAttempt;
use crate::domain::repository::FailedAttemptRepository;
use crate::error::{AuthError, AuthResult};

pub struct LockoutGuard<R>
where
    R: FailedAttemptRepository,
{
    repo: Arc<R>,
    policy: LockoutPolicy,
}

impl<R> LockoutGuard<R>
where
    R: FailedAttemptRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, policy: LockoutPolicy) -> Self {
        Self { repo, policy }
    }

    /// Fail with `AccountLocked` while the key is locked
    pub async fn check(&self, lockout_key: &str) -> AuthResult<()> {
        let Some(attempt) = self.repo.find_failed_attempt(lockout_key).await? else {
            return Ok(());
        };

        match self.remaining_lock_secs(&attempt, Utc::now().timestamp_millis()) {
            Some(retry_after_secs) => Err(AuthError::AccountLocked { retry_after_secs }),
            None => Ok(()),
        }
    }

    /// Count a failure; returns `AccountLocked` when this failure reaches the threshold
    pub async fn record_failure(
        &self,
        lockout_key: &str,
        user_id: Option<&UserId>,
        identity: &str,
    ) -> AuthResult<()> {
        let attempt = self
            .repo
            .record_failed_attempt(lockout_key, user_id, identity, self.policy.cooldown_ms())
            .await?;

        tracing::debug!(
            lockout_key,
            attempt_count = attempt.attempt_count,
            threshold = self.policy.threshold,
            "Failed sign-in recorded"
        );

        match self.remaining_lock_secs(&attempt, Utc::now().timestamp_millis()) {
            Some(retry_after_secs) => {
                tracing::warn!(lockout_key, retry_after_secs, "Lockout threshold reached");
                Err(AuthError::AccountLocked { retry_after_secs })
            }
            None => Ok(()),
        }
    }

    /// Reset the counter after a successful sign-in
    pub async fn record_success(&self, lockout_key: &str) -> AuthResult<()> {
        self.repo.clear_failed_attempts(lockout_key).await
    }

    /// Seconds until the lock lifts, or `None` when not locked
    fn remaining_lock_secs(&self, attempt: &FailedAttempt, now_ms: i64) -> Option<u64> {
        if attempt.attempt_count < self.policy.threshold {
            return None;
        }

        let unlock_at_ms = attempt.last_attempt_at_ms + self.policy.cooldown_ms();
        let remaining_ms = unlock_at_ms - now_ms;
        if remaining_ms <= 0 {
            return None;
        }

        // Round up so clients never retry a moment too early
        Some(((remaining_ms as u64) + 999) / 1000)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::infra::memory::MemoryAuthRepository;

    fn guard(threshold: u32, cooldown: Duration) -> LockoutGuard<MemoryAuthRepository> {
        LockoutGuard::new(
            Arc::new(MemoryAuthRepository::new()),
            LockoutPolicy::new(threshold, cooldown),
        )
    }

    #[tokio::test]
    async fn test_locks_on_threshold() {
        let guard = guard(3, Duration::from_secs(60));
        let key = "identity:a@example.com";

        assert!(guard.record_failure(key, None, "a@example.com").await.is_ok());
        assert!(guard.record_failure(key, None, "a@example.com").await.is_ok());
        assert!(guard.check(key).await.is_ok());

        let third = guard.record_failure(key, None, "a@example.com").await;
        match third {
            Err(AuthError::AccountLocked { retry_after_secs }) => {
                assert!(retry_after_secs > 0 && retry_after_secs <= 60)
            }
            other => panic!("expected AccountLocked, got {other:?}"),
        }
        assert!(matches!(
            guard.check(key).await,
            Err(AuthError::AccountLocked { .. })
        ));
    }

    #[tokio::test]
    async fn test_success_clears_counter() {
        let guard = guard(2, Duration::from_secs(60));
        let key = "identity:b@example.com";

        guard.record_failure(key, None, "b@example.com").await.unwrap();
        guard.record_success(key).await.unwrap();
        assert!(guard.record_failure(key, None, "b@example.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_lock_lifts_after_cooldown() {
        let repo = Arc::new(MemoryAuthRepository::new());
        let guard = LockoutGuard::new(repo.clone(), LockoutPolicy::new(1, Duration::from_secs(60)));
        let key = "identity:c@example.com";

        assert!(guard.record_failure(key, None, "c@example.com").await.is_err());
        repo.age_failed_attempt(key, Duration::from_secs(61));
        assert!(guard.check(key).await.is_ok());

        // The stale row restarts the count
        assert!(guard.record_failure(key, None, "c@example.com").await.is_err());
        assert_eq!(repo.failed_attempt(key).unwrap().attempt_count, 1);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let guard = guard(1, Duration::from_secs(10));
        let attempt = FailedAttempt {
            lockout_key: "k".into(),
            user_id: None,
            identity: "x".into(),
            attempt_count: 1,
            last_attempt_at_ms: 1_000,
        };

        assert_eq!(guard.remaining_lock_secs(&attempt, 1_000), Some(10));
        assert_eq!(guard.remaining_lock_secs(&attempt, 10_500), Some(1));
        assert_eq!(guard.remaining_lock_secs(&attempt, 11_000), None);
    }
}
