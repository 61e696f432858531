//! Password Reset Use Case
//!
//! Request: mint a single-use token and deliver it out of band.
//! Consume: trade the token for a new password, revoking every session.

use std::sync::Arc;

use platform::client::ClientInfo;
use platform::crypto::{random_token, sha256_hex};
use platform::notify::{Notification, Notifier};
use platform::password::ClearTextPassword;

use crate::application::audit::AuditRecorder;
use crate::application::config::AuthConfig;
use crate::domain::entity::audit_log::{AttemptType, LoginAuditEntry};
use crate::domain::entity::password_reset::PasswordResetToken;
use crate::domain::entity::user::User;
use crate::domain::repository::{PasswordResetRepository, UserRepository};
use crate::domain::value_object::Identity;
use crate::error::{AuthError, AuthResult};

const RESET_TOKEN_BYTES: usize = 32;

pub struct PasswordResetUseCase<R, N>
where
    R: UserRepository + PasswordResetRepository,
    N: Notifier,
{
    repo: Arc<R>,
    notifier: Arc<N>,
    audit: Arc<AuditRecorder>,
    config: Arc<AuthConfig>,
}

impl<R, N> PasswordResetUseCase<R, N>
where
    R: UserRepository + PasswordResetRepository + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn new(
        repo: Arc<R>,
        notifier: Arc<N>,
        audit: Arc<AuditRecorder>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            repo,
            notifier,
            audit,
            config,
        }
    }

    /// Start a reset for the identity
    ///
    /// Succeeds whether or not the identity is registered, so the response
    /// never reveals which accounts exist. Minting and delivery run on a
    /// detached task; both paths return right after the lookup. Delivery
    /// failures are logged only.
    pub async fn request(&self, identity: &str, client: &ClientInfo) -> AuthResult<()> {
        let identity = Identity::parse(identity)?;
        let entry = LoginAuditEntry::new(AttemptType::PasswordResetRequest, client)
            .identity(identity.as_str());

        let Some(user) = self.repo.find_user_by_identity(&identity).await? else {
            tracing::debug!(kind = identity.kind(), "Password reset requested for unknown identity");
            self.audit.record(entry.failed(AuthError::NotFound.code()));
            return Ok(());
        };

        let repo = self.repo.clone();
        let notifier = self.notifier.clone();
        let audit = self.audit.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            let entry = entry.user(user.user_id, user.role.id());
            match issue_reset(&*repo, &*notifier, &config, &user, &identity).await {
                Ok(()) => audit.record(entry.succeeded()),
                Err(e) => {
                    e.log();
                    audit.record(entry.failed(e.code()));
                }
            }
        });
        Ok(())
    }

    /// Consume a reset token and set the new password
    pub async fn consume(&self, token: &str, new_password: String, client: &ClientInfo) -> AuthResult<()> {
        let entry = LoginAuditEntry::new(AttemptType::PasswordReset, client);

        let result = self.reset(token, new_password).await;
        match &result {
            Ok(user_id) => {
                tracing::info!(user_id = %user_id, "Password reset completed, sessions revoked");
                let mut entry = entry.succeeded();
                entry.user_id = Some(*user_id);
                self.audit.record(entry);
            }
            Err(e) => self.audit.record(entry.failed(e.code())),
        }
        result.map(|_| ())
    }

    async fn reset(&self, token: &str, new_password: String) -> AuthResult<kernel::id::UserId> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let password = ClearTextPassword::new(new_password)?;
        let password_hash = password.hash(self.config.pepper())?;

        self.repo
            .consume_reset_token(&sha256_hex(token.as_bytes()), &password_hash)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)
    }
}

/// Store a fresh token for `user` and deliver it
async fn issue_reset<R, N>(
    repo: &R,
    notifier: &N,
    config: &AuthConfig,
    user: &User,
    identity: &Identity,
) -> AuthResult<()>
where
    R: PasswordResetRepository,
    N: Notifier,
{
    let token = random_token(RESET_TOKEN_BYTES);
    let ttl = chrono::Duration::from_std(config.password_reset_ttl)
        .map_err(|e| AuthError::Internal(format!("Invalid reset TTL: {e}")))?;
    repo.create_reset_token(&PasswordResetToken::new(
        user.user_id,
        sha256_hex(token.as_bytes()),
        ttl,
    ))
    .await?;

    let notification = reset_notification(identity, &token, config.password_reset_ttl.as_secs() / 60);
    match tokio::time::timeout(config.notify_timeout, notifier.deliver(&notification)).await {
        Ok(Ok(())) => {
            tracing::info!(user_id = %user.user_id, channel = %notification.channel, "Password reset token sent");
        }
        Ok(Err(e)) => {
            tracing::warn!(user_id = %user.user_id, error = %e, "Password reset delivery failed");
        }
        Err(_) => {
            tracing::warn!(user_id = %user.user_id, "Password reset delivery timed out");
        }
    }
    Ok(())
}

fn reset_notification(identity: &Identity, token: &str, ttl_mins: u64) -> Notification {
    let body = format!(
        "Password reset token: {token}\nIt expires in {ttl_mins} minutes. Ignore this message if you did not ask for a reset."
    );

    match identity {
        Identity::Email(email) => Notification::email(email.as_str(), "Reset your password", body),
        Identity::Phone(phone) => Notification::sms(phone.as_str(), body),
    }
}
