//! Check Access Use Case
//!
//! Verifies a user access token and re-checks it against the live user
//! record. A signature check alone is never enough: the role claim must
//! still match and the minting session must still exist.

use std::sync::Arc;

use kernel::id::{SessionId, UserId};

use crate::application::token_codec::TokenCodec;
use crate::domain::repository::{SessionRepository, UserRepository};
use crate::domain::value_object::user_role::UserRole;
use crate::error::{AuthError, AuthResult};

/// Caller identity attached to requests that passed the user check
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub role: UserRole,
    pub session_id: SessionId,
}

pub struct CheckAccessUseCase<R>
where
    R: UserRepository + SessionRepository,
{
    repo: Arc<R>,
    codec: Arc<TokenCodec>,
}

impl<R> CheckAccessUseCase<R>
where
    R: UserRepository + SessionRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, codec: Arc<TokenCodec>) -> Self {
        Self { repo, codec }
    }

    pub async fn execute(&self, access_token: &str) -> AuthResult<AuthenticatedUser> {
        let claims = self.codec.decode_access_token(access_token)?;
        let user_id = claims.user_id();

        let user = self
            .repo
            .find_user_by_id(&user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if user.role.id() != claims.role_id {
            tracing::warn!(
                user_id = %user_id,
                token_role = claims.role_id,
                live_role = user.role.id(),
                "Role drift detected"
            );
            return Err(AuthError::RoleDrifted);
        }

        if !user.can_login() {
            return Err(AuthError::AccountDisabled);
        }

        let session_id = claims.session_id();
        if !self.repo.session_exists(&session_id).await? {
            return Err(AuthError::SessionExpired);
        }

        Ok(AuthenticatedUser {
            user_id,
            role: user.role,
            session_id,
        })
    }
}
