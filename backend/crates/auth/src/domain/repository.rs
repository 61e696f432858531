//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.
//! Operations documented as atomic must be a single statement or a single
//! transaction in every implementation.

use kernel::id::{SessionId, UserId};
use platform::password::HashedPassword;

use crate::domain::entity::{
    api_credential::ApiCredential, audit_log::LoginAuditEntry, failed_attempt::FailedAttempt,
    password_reset::PasswordResetToken,
    user::User,
    user_session::{RotateOutcome, UserSession},
};
use crate::domain::value_object::{Identity, user_role::UserRole};
use crate::error::AuthResult;

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Create a new user; duplicate email/phone yields `IdentityTaken`
    async fn create_user(&self, user: &User) -> AuthResult<()>;

    /// Find user by ID
    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    /// Find user by normalized email or phone
    async fn find_user_by_identity(&self, identity: &Identity) -> AuthResult<Option<User>>;

    /// Check if an identity is already registered
    async fn identity_exists(&self, identity: &Identity) -> AuthResult<bool>;
}

/// Role name lookup
#[trait_variant::make(RoleRepository: Send)]
pub trait LocalRoleRepository {
    async fn find_role_name(&self, role: UserRole) -> AuthResult<Option<String>>;
}

/// API client credentials
#[trait_variant::make(ApiCredentialRepository: Send)]
pub trait LocalApiCredentialRepository {
    async fn find_credential(&self, client_id: &str) -> AuthResult<Option<ApiCredential>>;

    /// Insert or replace by `client_id` (startup provisioning)
    async fn upsert_credential(&self, credential: &ApiCredential) -> AuthResult<()>;
}

/// Refresh-token backed sessions
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    async fn create_session(&self, session: &UserSession) -> AuthResult<()>;

    /// Atomically swap `old_hash` for `new_hash` on a live session.
    ///
    /// When `old_hash` was already superseded on a live session, that
    /// session is deleted and `Reused` is returned.
    async fn rotate_refresh_token(&self, old_hash: &str, new_hash: &str) -> AuthResult<RotateOutcome>;

    /// Delete the session holding this refresh token, returning its owner if one went away
    async fn delete_session_by_token(&self, token_hash: &str) -> AuthResult<Option<UserId>>;

    /// Delete every session of a user
    async fn delete_sessions_for_user(&self, user_id: &UserId) -> AuthResult<u64>;

    /// Live sessions of a user, newest first
    async fn list_sessions(&self, user_id: &UserId) -> AuthResult<Vec<UserSession>>;

    /// Whether the session exists and has not expired
    async fn session_exists(&self, session_id: &SessionId) -> AuthResult<bool>;

    /// Delete expired sessions (superseded hashes go with them)
    async fn cleanup_expired_sessions(&self) -> AuthResult<u64>;
}

/// Failed login counters
#[trait_variant::make(FailedAttemptRepository: Send)]
pub trait LocalFailedAttemptRepository {
    async fn find_failed_attempt(&self, lockout_key: &str) -> AuthResult<Option<FailedAttempt>>;

    /// Atomically increment the counter for `lockout_key`.
    ///
    /// A row whose last attempt is older than `window_ms` restarts at 1.
    async fn record_failed_attempt(
        &self,
        lockout_key: &str,
        user_id: Option<&UserId>,
        identity: &str,
        window_ms: i64,
    ) -> AuthResult<FailedAttempt>;

    async fn clear_failed_attempts(&self, lockout_key: &str) -> AuthResult<()>;
}

/// Append-only audit sink
#[trait_variant::make(AuditLogRepository: Send)]
pub trait LocalAuditLogRepository {
    async fn insert_audit_entry(&self, entry: &LoginAuditEntry) -> AuthResult<()>;
}

/// Password reset tokens
#[trait_variant::make(PasswordResetRepository: Send)]
pub trait LocalPasswordResetRepository {
    /// Store a token, replacing any earlier token of the same user
    async fn create_reset_token(&self, token: &PasswordResetToken) -> AuthResult<()>;

    /// In one transaction: consume the live token, set the new password,
    /// revoke every session and clear failed-attempt counters of the user.
    ///
    /// Returns `None` when no live token matches.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password: &HashedPassword,
    ) -> AuthResult<Option<UserId>>;

    async fn cleanup_expired_reset_tokens(&self) -> AuthResult<u64>;
}

/// Everything the auth HTTP surface needs from storage
pub trait AuthStore:
    UserRepository
    + RoleRepository
    + ApiCredentialRepository
    + SessionRepository
    + FailedAttemptRepository
    + AuditLogRepository
    + PasswordResetRepository
    + Clone
    + Send
    + Sync
    + 'static
{
}

impl<T> AuthStore for T where
    T: UserRepository
        + RoleRepository
        + ApiCredentialRepository
        + SessionRepository
        + FailedAttemptRepository
        + AuditLogRepository
        + PasswordResetRepository
        + Clone
        + Send
        + Sync
        + 'static
{
}
