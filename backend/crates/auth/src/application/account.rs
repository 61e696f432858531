//! Account Use Cases
//!
//! Read-only views for an authenticated user: profile and live sessions.

use std::sync::Arc;

use kernel::id::{SessionId, UserId};

use crate::application::role_cache::RoleCache;
use crate::domain::entity::user::User;
use crate::domain::entity::user_session::UserSession;
use crate::domain::repository::{RoleRepository, SessionRepository, UserRepository};
use crate::error::{AuthError, AuthResult};

pub struct SessionView {
    pub session: UserSession,
    /// The session the caller's access token was minted for
    pub is_current: bool,
}

pub struct ListSessionsUseCase<R>
where
    R: SessionRepository,
{
    repo: Arc<R>,
}

impl<R> ListSessionsUseCase<R>
where
    R: SessionRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, user_id: &UserId, current: &SessionId) -> AuthResult<Vec<SessionView>> {
        let sessions = self.repo.list_sessions(user_id).await?;

        Ok(sessions
            .into_iter()
            .map(|session| SessionView {
                is_current: session.session_id == *current,
                session,
            })
            .collect())
    }
}

pub struct CurrentUser {
    pub user: User,
    pub role_name: Option<String>,
}

pub struct CurrentUserUseCase<R>
where
    R: UserRepository + RoleRepository,
{
    repo: Arc<R>,
    roles: Arc<RoleCache<R>>,
}

impl<R> CurrentUserUseCase<R>
where
    R: UserRepository + RoleRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, roles: Arc<RoleCache<R>>) -> Self {
        Self { repo, roles }
    }

    pub async fn execute(&self, user_id: &UserId) -> AuthResult<CurrentUser> {
        let user = self
            .repo
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::NotFound)?;
        let role_name = self.roles.role_name(user.role).await?;

        Ok(CurrentUser { user, role_name })
    }
}
