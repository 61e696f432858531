//! In-Memory Repository
//!
//! Mutex-guarded maps implementing every auth repository trait. Each
//! operation runs under one lock, which gives the same per-row atomicity as
//! the single-statement / single-transaction SQL in `postgres.rs`.
//! Used by tests and for running the router without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use kernel::id::{SessionId, UserId};
use platform::password::HashedPassword;

use crate::domain::entity::{
    api_credential::ApiCredential,
    audit_log::LoginAuditEntry,
    failed_attempt::FailedAttempt,
    password_reset::PasswordResetToken,
    user::User,
    user_session::{RotateOutcome, UserSession},
};
use crate::domain::repository::{
    ApiCredentialRepository, AuditLogRepository, FailedAttemptRepository,
    PasswordResetRepository, RoleRepository, SessionRepository, UserRepository,
};
use crate::domain::value_object::{Identity, user_role::UserRole, user_status::UserStatus};
use crate::error::{AuthError, AuthResult};

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    roles: HashMap<i16, String>,
    credentials: HashMap<String, ApiCredential>,
    sessions: HashMap<SessionId, UserSession>,
    /// Superseded refresh token hash -> owning session
    superseded: HashMap<String, SessionId>,
    failed_attempts: HashMap<String, FailedAttempt>,
    /// Keyed by token hash
    reset_tokens: HashMap<String, PasswordResetToken>,
    audit: Vec<LoginAuditEntry>,
    audit_failing: bool,
}

#[derive(Clone, Default)]
pub struct MemoryAuthRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryAuthRepository {
    /// Empty store seeded with the admin and customer roles
    pub fn new() -> Self {
        let repo = Self::default();
        {
            let mut state = repo.state();
            state.roles.insert(UserRole::ADMIN.id(), "admin".to_string());
            state.roles.insert(UserRole::CUSTOMER.id(), "customer".to_string());
        }
        repo
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_role(&self, role: UserRole, name: impl Into<String>) {
        self.state().roles.insert(role.id(), name.into());
    }

    /// Change a user's role in place (e.g. an admin promotion)
    pub fn set_user_role(&self, user_id: &UserId, role: UserRole) {
        if let Some(user) = self.state().users.get_mut(user_id) {
            user.role = role;
            user.updated_at = Utc::now();
        }
    }

    pub fn set_user_status(&self, user_id: &UserId, status: UserStatus) {
        if let Some(user) = self.state().users.get_mut(user_id) {
            user.status = status;
            user.updated_at = Utc::now();
        }
    }

    /// Make audit inserts fail
    pub fn set_audit_failing(&self, failing: bool) {
        self.state().audit_failing = failing;
    }

    pub fn audit_entries(&self) -> Vec<LoginAuditEntry> {
        self.state().audit.clone()
    }

    pub fn session_count(&self, user_id: &UserId) -> usize {
        self.state()
            .sessions
            .values()
            .filter(|s| s.user_id == *user_id)
            .count()
    }

    pub fn failed_attempt(&self, lockout_key: &str) -> Option<FailedAttempt> {
        self.state().failed_attempts.get(lockout_key).cloned()
    }

    /// Move the last failure of `lockout_key` into the past
    pub fn age_failed_attempt(&self, lockout_key: &str, by: Duration) {
        if let Some(attempt) = self.state().failed_attempts.get_mut(lockout_key) {
            attempt.last_attempt_at_ms -= by.as_millis() as i64;
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for MemoryAuthRepository {
    async fn create_user(&self, user: &User) -> AuthResult<()> {
        let mut state = self.state();

        let taken = state.users.values().any(|existing| {
            (user.email.is_some() && existing.email == user.email)
                || (user.phone.is_some() && existing.phone == user.phone)
        });
        if taken {
            return Err(AuthError::IdentityTaken);
        }

        state.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        Ok(self.state().users.get(user_id).cloned())
    }

    async fn find_user_by_identity(&self, identity: &Identity) -> AuthResult<Option<User>> {
        Ok(self
            .state()
            .users
            .values()
            .find(|u| u.matches(identity))
            .cloned())
    }

    async fn identity_exists(&self, identity: &Identity) -> AuthResult<bool> {
        Ok(self.state().users.values().any(|u| u.matches(identity)))
    }
}

// ============================================================================
// Role Repository Implementation
// ============================================================================

impl RoleRepository for MemoryAuthRepository {
    async fn find_role_name(&self, role: UserRole) -> AuthResult<Option<String>> {
        Ok(self.state().roles.get(&role.id()).cloned())
    }
}

// ============================================================================
// API Credential Repository Implementation
// ============================================================================

impl ApiCredentialRepository for MemoryAuthRepository {
    async fn find_credential(&self, client_id: &str) -> AuthResult<Option<ApiCredential>> {
        Ok(self.state().credentials.get(client_id).cloned())
    }

    async fn upsert_credential(&self, credential: &ApiCredential) -> AuthResult<()> {
        self.state()
            .credentials
            .insert(credential.client_id.clone(), credential.clone());
        Ok(())
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for MemoryAuthRepository {
    async fn create_session(&self, session: &UserSession) -> AuthResult<()> {
        self.state()
            .sessions
            .insert(session.session_id, session.clone());
        Ok(())
    }

    async fn rotate_refresh_token(&self, old_hash: &str, new_hash: &str) -> AuthResult<RotateOutcome> {
        let mut state = self.state();
        let now = now_ms();

        let live = state
            .sessions
            .values_mut()
            .find(|s| s.refresh_token_hash == old_hash && s.expires_at_ms > now);

        if let Some(session) = live {
            session.refresh_token_hash = new_hash.to_string();
            session.last_activity_at = Utc::now();
            let rotated = session.clone();
            state.superseded.insert(old_hash.to_string(), rotated.session_id);
            return Ok(RotateOutcome::Rotated(rotated));
        }

        let Some(session_id) = state.superseded.get(old_hash).copied() else {
            return Ok(RotateOutcome::NotFound);
        };

        match state.sessions.remove(&session_id) {
            Some(session) => {
                state.superseded.retain(|_, owner| *owner != session_id);
                Ok(RotateOutcome::Reused {
                    session_id,
                    user_id: session.user_id,
                })
            }
            None => Ok(RotateOutcome::NotFound),
        }
    }

    async fn delete_session_by_token(&self, token_hash: &str) -> AuthResult<Option<UserId>> {
        let mut state = self.state();

        let session_id = state
            .sessions
            .values()
            .find(|s| s.refresh_token_hash == token_hash)
            .map(|s| s.session_id);

        let Some(session_id) = session_id else {
            return Ok(None);
        };

        state.superseded.retain(|_, owner| *owner != session_id);
        Ok(state.sessions.remove(&session_id).map(|s| s.user_id))
    }

    async fn delete_sessions_for_user(&self, user_id: &UserId) -> AuthResult<u64> {
        let mut state = self.state();

        let doomed: Vec<SessionId> = state
            .sessions
            .values()
            .filter(|s| s.user_id == *user_id)
            .map(|s| s.session_id)
            .collect();

        for session_id in &doomed {
            state.sessions.remove(session_id);
        }
        state.superseded.retain(|_, owner| !doomed.contains(owner));

        Ok(doomed.len() as u64)
    }

    async fn list_sessions(&self, user_id: &UserId) -> AuthResult<Vec<UserSession>> {
        let now = now_ms();
        let mut sessions: Vec<UserSession> = self
            .state()
            .sessions
            .values()
            .filter(|s| s.user_id == *user_id && s.expires_at_ms > now)
            .cloned()
            .collect();

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn session_exists(&self, session_id: &SessionId) -> AuthResult<bool> {
        let now = now_ms();
        Ok(self
            .state()
            .sessions
            .get(session_id)
            .is_some_and(|s| s.expires_at_ms > now))
    }

    async fn cleanup_expired_sessions(&self) -> AuthResult<u64> {
        let mut state = self.state();
        let now = now_ms();

        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.expires_at_ms > now);
        let deleted = (before - state.sessions.len()) as u64;

        let MemoryState {
            sessions,
            superseded,
            ..
        } = &mut *state;
        superseded.retain(|_, owner| sessions.contains_key(owner));

        Ok(deleted)
    }
}

// ============================================================================
// Failed Attempt Repository Implementation
// ============================================================================

impl FailedAttemptRepository for MemoryAuthRepository {
    async fn find_failed_attempt(&self, lockout_key: &str) -> AuthResult<Option<FailedAttempt>> {
        Ok(self.state().failed_attempts.get(lockout_key).cloned())
    }

    async fn record_failed_attempt(
        &self,
        lockout_key: &str,
        user_id: Option<&UserId>,
        identity: &str,
        window_ms: i64,
    ) -> AuthResult<FailedAttempt> {
        let mut state = self.state();
        let now = now_ms();

        let attempt = state
            .failed_attempts
            .entry(lockout_key.to_string())
            .and_modify(|a| {
                a.attempt_count = if a.last_attempt_at_ms <= now - window_ms {
                    1
                } else {
                    a.attempt_count + 1
                };
                a.last_attempt_at_ms = now;
                a.identity = identity.to_string();
                if user_id.is_some() {
                    a.user_id = user_id.copied();
                }
            })
            .or_insert_with(|| FailedAttempt {
                lockout_key: lockout_key.to_string(),
                user_id: user_id.copied(),
                identity: identity.to_string(),
                attempt_count: 1,
                last_attempt_at_ms: now,
            });

        Ok(attempt.clone())
    }

    async fn clear_failed_attempts(&self, lockout_key: &str) -> AuthResult<()> {
        self.state().failed_attempts.remove(lockout_key);
        Ok(())
    }
}

// ============================================================================
// Audit Log Repository Implementation
// ============================================================================

impl AuditLogRepository for MemoryAuthRepository {
    async fn insert_audit_entry(&self, entry: &LoginAuditEntry) -> AuthResult<()> {
        let mut state = self.state();
        if state.audit_failing {
            return Err(AuthError::Internal("audit store unavailable".into()));
        }
        state.audit.push(entry.clone());
        Ok(())
    }
}

// ============================================================================
// Password Reset Repository Implementation
// ============================================================================

impl PasswordResetRepository for MemoryAuthRepository {
    async fn create_reset_token(&self, token: &PasswordResetToken) -> AuthResult<()> {
        let mut state = self.state();
        state.reset_tokens.retain(|_, t| t.user_id != token.user_id);
        state
            .reset_tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password: &HashedPassword,
    ) -> AuthResult<Option<UserId>> {
        let mut state = self.state();
        let now = now_ms();

        let live = state
            .reset_tokens
            .get(token_hash)
            .is_some_and(|t| t.expires_at_ms > now);
        if !live {
            return Ok(None);
        }
        let Some(token) = state.reset_tokens.remove(token_hash) else {
            return Ok(None);
        };
        let user_id = token.user_id;

        if let Some(user) = state.users.get_mut(&user_id) {
            user.password_hash = new_password.clone();
            user.updated_at = Utc::now();
        }

        let doomed: Vec<SessionId> = state
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.session_id)
            .collect();
        for session_id in &doomed {
            state.sessions.remove(session_id);
        }
        state.superseded.retain(|_, owner| !doomed.contains(owner));
        state
            .failed_attempts
            .retain(|_, a| a.user_id != Some(user_id));

        Ok(Some(user_id))
    }

    async fn cleanup_expired_reset_tokens(&self) -> AuthResult<u64> {
        let mut state = self.state();
        let now = now_ms();

        let before = state.reset_tokens.len();
        state.reset_tokens.retain(|_, t| t.expires_at_ms > now);
        Ok((before - state.reset_tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use platform::client::ClientInfo;

    use super::*;

    #[tokio::test]
    async fn test_rotation_then_reuse() {
        let repo = MemoryAuthRepository::new();
        let session = UserSession::new(UserId::new(), "h1".into(), &ClientInfo::new(None, None), Duration::days(1));
        repo.create_session(&session).await.unwrap();

        assert!(matches!(
            repo.rotate_refresh_token("h1", "h2").await.unwrap(),
            RotateOutcome::Rotated(s) if s.refresh_token_hash == "h2"
        ));
        assert!(matches!(
            repo.rotate_refresh_token("h1", "h3").await.unwrap(),
            RotateOutcome::Reused { session_id, .. } if session_id == session.session_id
        ));
        // The whole session went away with the reuse
        assert!(matches!(
            repo.rotate_refresh_token("h2", "h4").await.unwrap(),
            RotateOutcome::NotFound
        ));
    }

    #[tokio::test]
    async fn test_expired_session_does_not_rotate() {
        let repo = MemoryAuthRepository::new();
        let session = UserSession::new(UserId::new(), "h1".into(), &ClientInfo::new(None, None), Duration::zero());
        repo.create_session(&session).await.unwrap();

        assert!(matches!(
            repo.rotate_refresh_token("h1", "h2").await.unwrap(),
            RotateOutcome::NotFound
        ));
        assert_eq!(repo.cleanup_expired_sessions().await.unwrap(), 1);
    }
}
