//! Sign Out Use Case
//!
//! Revokes one session by its refresh token, or every session of a user.
//! Revoking something that does not exist is not an error.

use std::sync::Arc;

use kernel::id::UserId;
use platform::client::ClientInfo;
use platform::crypto::sha256_hex;

use crate::application::audit::AuditRecorder;
use crate::domain::entity::audit_log::{AttemptType, LoginAuditEntry};
use crate::domain::repository::SessionRepository;
use crate::domain::value_object::user_role::UserRole;
use crate::error::AuthResult;

pub struct SignOutUseCase<R>
where
    R: SessionRepository,
{
    repo: Arc<R>,
    audit: Arc<AuditRecorder>,
}

impl<R> SignOutUseCase<R>
where
    R: SessionRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, audit: Arc<AuditRecorder>) -> Self {
        Self { repo, audit }
    }

    /// Returns whether a session was actually removed
    pub async fn execute(&self, refresh_token: &str, client: &ClientInfo) -> AuthResult<bool> {
        let refresh_token = refresh_token.trim();
        let mut entry = LoginAuditEntry::new(AttemptType::Logout, client);

        let owner = if refresh_token.is_empty() {
            None
        } else {
            self.repo
                .delete_session_by_token(&sha256_hex(refresh_token.as_bytes()))
                .await?
        };

        if let Some(user_id) = owner {
            tracing::info!(user_id = %user_id, "Session revoked");
            entry.user_id = Some(user_id);
        }
        self.audit.record(entry.succeeded());

        Ok(owner.is_some())
    }

    /// Revoke every session of the user; returns how many went away
    pub async fn execute_all(
        &self,
        user_id: &UserId,
        role: UserRole,
        client: &ClientInfo,
    ) -> AuthResult<u64> {
        let revoked = self.repo.delete_sessions_for_user(user_id).await?;

        tracing::info!(user_id = %user_id, revoked, "All sessions revoked");
        self.audit.record(
            LoginAuditEntry::new(AttemptType::LogoutAll, client)
                .user(*user_id, role.id())
                .succeeded(),
        );

        Ok(revoked)
    }
}
