//! Sign In Use Case
//!
//! Authenticates a user behind the lockout guard and opens a session.

use std::fmt;
use std::sync::Arc;

use platform::client::ClientInfo;
use platform::crypto::{random_token, sha256_hex};
use platform::password::{ClearTextPassword, dummy_verify};

use crate::application::audit::AuditRecorder;
use crate::application::config::AuthConfig;
use crate::application::lockout::LockoutGuard;
use crate::application::token_codec::TokenCodec;
use crate::domain::entity::audit_log::{AttemptType, LoginAuditEntry};
use crate::domain::entity::failed_attempt::FailedAttempt;
use crate::domain::entity::user::User;
use crate::domain::entity::user_session::UserSession;
use crate::domain::repository::{FailedAttemptRepository, SessionRepository, UserRepository};
use crate::domain::value_object::{Identity, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

/// Refresh tokens carry 256 bits of entropy
pub(crate) const REFRESH_TOKEN_BYTES: usize = 32;

/// Which login endpoint the request came through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPortal {
    /// Admin console: role 1 only
    Admin,
    /// Storefront: every non-admin role
    Customer,
}

impl LoginPortal {
    pub fn admits(&self, role: UserRole) -> bool {
        match self {
            Self::Admin => role.is_admin(),
            Self::Customer => !role.is_admin(),
        }
    }
}

pub struct SignInInput {
    /// Email or phone number
    pub identity: String,
    pub password: String,
    pub portal: LoginPortal,
}

pub struct SignInOutput {
    pub access_token: String,
    /// Unix seconds
    pub access_expires_at: i64,
    pub refresh_token: String,
    pub refresh_expires_at_ms: i64,
    pub user: User,
}

impl fmt::Debug for SignInOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInOutput")
            .field("access_token", &"[REDACTED]")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_token", &"[REDACTED]")
            .field("refresh_expires_at_ms", &self.refresh_expires_at_ms)
            .field("user_id", &self.user.user_id)
            .finish_non_exhaustive()
    }
}

pub struct SignInUseCase<R>
where
    R: UserRepository + SessionRepository + FailedAttemptRepository,
{
    repo: Arc<R>,
    codec: Arc<TokenCodec>,
    audit: Arc<AuditRecorder>,
    config: Arc<AuthConfig>,
}

impl<R> SignInUseCase<R>
where
    R: UserRepository + SessionRepository + FailedAttemptRepository + Send + Sync,
{
    pub fn new(
        repo: Arc<R>,
        codec: Arc<TokenCodec>,
        audit: Arc<AuditRecorder>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            repo,
            codec,
            audit,
            config,
        }
    }

    pub async fn execute(&self, input: SignInInput, client: &ClientInfo) -> AuthResult<SignInOutput> {
        let mut entry = LoginAuditEntry::new(AttemptType::Login, client);

        let result = self.authenticate(input, client, &mut entry).await;
        match &result {
            Ok(out) => {
                tracing::info!(
                    user_id = %out.user.user_id,
                    role = %out.user.role,
                    device = %client.device.device_type,
                    "User signed in"
                );
                self.audit.record(entry.succeeded());
            }
            Err(e) => self.audit.record(entry.failed(e.code())),
        }
        result
    }

    async fn authenticate(
        &self,
        input: SignInInput,
        client: &ClientInfo,
        entry: &mut LoginAuditEntry,
    ) -> AuthResult<SignInOutput> {
        // Malformed identities are treated like unknown ones
        let identity = Identity::parse(&input.identity).ok();
        let identity_key = identity
            .as_ref()
            .map(|i| i.as_str().to_string())
            .unwrap_or_else(|| input.identity.trim().to_lowercase());
        entry.identity = Some(identity_key.clone());

        let user = match &identity {
            Some(identity) => self.repo.find_user_by_identity(identity).await?,
            None => None,
        };
        if let Some(user) = &user {
            entry.user_id = Some(user.user_id);
            entry.role = Some(user.role.id());
        }

        let lockout = LockoutGuard::new(self.repo.clone(), self.config.lockout.clone());
        let lockout_key = FailedAttempt::key_for(user.as_ref().map(|u| &u.user_id), &identity_key);

        // Time-based lock: refused even when the password would be correct
        lockout.check(&lockout_key).await?;

        let password = ClearTextPassword::secret(input.password);

        let Some(user) = user else {
            dummy_verify(&password);
            lockout.record_failure(&lockout_key, None, &identity_key).await?;
            return Err(AuthError::InvalidCredential);
        };

        if !user.password_hash.verify(&password, self.config.pepper()) {
            lockout
                .record_failure(&lockout_key, Some(&user.user_id), &identity_key)
                .await?;
            return Err(AuthError::InvalidCredential);
        }

        if !input.portal.admits(user.role) {
            tracing::warn!(user_id = %user.user_id, portal = ?input.portal, "Sign-in through wrong portal");
            return Err(AuthError::InvalidCredential);
        }

        if !user.can_login() {
            return Err(AuthError::AccountDisabled);
        }

        lockout.record_success(&lockout_key).await?;

        let refresh_token = random_token(REFRESH_TOKEN_BYTES);
        let ttl = chrono::Duration::from_std(self.config.refresh_token_ttl)
            .map_err(|e| AuthError::Internal(format!("Invalid refresh TTL: {e}")))?;
        let session = UserSession::new(user.user_id, sha256_hex(refresh_token.as_bytes()), client, ttl);
        self.repo.create_session(&session).await?;

        let access = self
            .codec
            .issue_access_token(&user.user_id, user.role, &session.session_id)?;

        Ok(SignInOutput {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token,
            refresh_expires_at_ms: session.expires_at_ms,
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portal_admission() {
        assert!(LoginPortal::Admin.admits(UserRole::ADMIN));
        assert!(!LoginPortal::Admin.admits(UserRole::CUSTOMER));
        assert!(LoginPortal::Customer.admits(UserRole::CUSTOMER));
        assert!(LoginPortal::Customer.admits(UserRole::from_id(3)));
        assert!(!LoginPortal::Customer.admits(UserRole::ADMIN));
    }
}
