//! Refresh Session Use Case
//!
//! Trades a refresh token for a new access token and rotates the refresh
//! token. Presenting an already rotated token revokes the whole session.

use std::fmt;
use std::sync::Arc;

use platform::client::ClientInfo;
use platform::crypto::{random_token, sha256_hex};

use crate::application::audit::AuditRecorder;
use crate::application::sign_in::REFRESH_TOKEN_BYTES;
use crate::application::token_codec::TokenCodec;
use crate::domain::entity::audit_log::{AttemptType, LoginAuditEntry};
use crate::domain::entity::user_session::RotateOutcome;
use crate::domain::repository::{SessionRepository, UserRepository};
use crate::error::{AuthError, AuthResult};

pub struct RefreshOutput {
    pub access_token: String,
    /// Unix seconds
    pub access_expires_at: i64,
    pub refresh_token: String,
    /// Rotation keeps the session's original expiry
    pub refresh_expires_at_ms: i64,
}

impl fmt::Debug for RefreshOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshOutput")
            .field("access_token", &"[REDACTED]")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_token", &"[REDACTED]")
            .field("refresh_expires_at_ms", &self.refresh_expires_at_ms)
            .finish()
    }
}

pub struct RefreshSessionUseCase<R>
where
    R: UserRepository + SessionRepository,
{
    repo: Arc<R>,
    codec: Arc<TokenCodec>,
    audit: Arc<AuditRecorder>,
}

impl<R> RefreshSessionUseCase<R>
where
    R: UserRepository + SessionRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, codec: Arc<TokenCodec>, audit: Arc<AuditRecorder>) -> Self {
        Self { repo, codec, audit }
    }

    pub async fn execute(&self, refresh_token: &str, client: &ClientInfo) -> AuthResult<RefreshOutput> {
        let mut entry = LoginAuditEntry::new(AttemptType::Refresh, client);

        let result = self.rotate(refresh_token, &mut entry).await;
        match &result {
            Ok(_) => self.audit.record(entry.succeeded()),
            Err(e) => self.audit.record(entry.failed(e.code())),
        }
        result
    }

    async fn rotate(&self, refresh_token: &str, entry: &mut LoginAuditEntry) -> AuthResult<RefreshOutput> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AuthError::SessionExpired);
        }

        let old_hash = sha256_hex(refresh_token.as_bytes());
        let new_token = random_token(REFRESH_TOKEN_BYTES);
        let new_hash = sha256_hex(new_token.as_bytes());

        let session = match self.repo.rotate_refresh_token(&old_hash, &new_hash).await? {
            RotateOutcome::Rotated(session) => session,
            RotateOutcome::Reused {
                session_id,
                user_id,
            } => {
                entry.user_id = Some(user_id);
                tracing::warn!(
                    user_id = %user_id,
                    session_id = %session_id,
                    "Superseded refresh token presented, session revoked"
                );
                return Err(AuthError::SessionReused);
            }
            RotateOutcome::NotFound => return Err(AuthError::SessionExpired),
        };

        // Access tokens always carry the live role
        let Some(user) = self.repo.find_user_by_id(&session.user_id).await? else {
            self.repo.delete_session_by_token(&new_hash).await?;
            return Err(AuthError::SessionExpired);
        };
        entry.user_id = Some(user.user_id);
        entry.role = Some(user.role.id());

        if !user.can_login() {
            let revoked = self.repo.delete_sessions_for_user(&user.user_id).await?;
            tracing::warn!(user_id = %user.user_id, revoked, "Refresh by disabled account");
            return Err(AuthError::AccountDisabled);
        }

        let access = self
            .codec
            .issue_access_token(&user.user_id, user.role, &session.session_id)?;

        tracing::debug!(user_id = %user.user_id, session_id = %session.session_id, "Session refreshed");

        Ok(RefreshOutput {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: new_token,
            refresh_expires_at_ms: session.expires_at_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_tokens() {
        let out = RefreshOutput {
            access_token: "eyJhbGciOiJIUzI1NiJ9.access".into(),
            access_expires_at: 1_700_000_900,
            refresh_token: "r-3f9a2c".into(),
            refresh_expires_at_ms: 1_702_592_000_000,
        };

        let debug = format!("{out:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("eyJhbGciOiJIUzI1NiJ9"));
        assert!(!debug.contains("r-3f9a2c"));
        assert!(debug.contains("1702592000000"));
    }
}
