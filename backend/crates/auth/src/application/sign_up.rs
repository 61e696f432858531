//! Sign Up Use Case
//!
//! Registers a customer account identified by email and/or phone.

use std::sync::Arc;

use kernel::id::UserId;
use platform::client::ClientInfo;
use platform::password::ClearTextPassword;

use crate::application::audit::AuditRecorder;
use crate::application::config::AuthConfig;
use crate::domain::entity::audit_log::{AttemptType, LoginAuditEntry};
use crate::domain::entity::user::User;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{Email, Identity, Phone};
use crate::error::{AuthError, AuthResult};

const MAX_NAME_LEN: usize = 100;

pub struct SignUpInput {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: String,
    pub terms_agreed: bool,
}

pub struct SignUpOutput {
    pub user_id: UserId,
}

pub struct SignUpUseCase<R>
where
    R: UserRepository,
{
    repo: Arc<R>,
    audit: Arc<AuditRecorder>,
    config: Arc<AuthConfig>,
}

impl<R> SignUpUseCase<R>
where
    R: UserRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, audit: Arc<AuditRecorder>, config: Arc<AuthConfig>) -> Self {
        Self {
            repo,
            audit,
            config,
        }
    }

    pub async fn execute(&self, input: SignUpInput, client: &ClientInfo) -> AuthResult<SignUpOutput> {
        let mut entry = LoginAuditEntry::new(AttemptType::Register, client);

        let result = self.register(input, &mut entry).await;
        match &result {
            Ok(out) => {
                tracing::info!(user_id = %out.user_id, "User registered");
                self.audit.record(entry.succeeded());
            }
            Err(e) => self.audit.record(entry.failed(e.code())),
        }
        result
    }

    async fn register(&self, input: SignUpInput, entry: &mut LoginAuditEntry) -> AuthResult<SignUpOutput> {
        let first_name = validate_name("first_name", &input.first_name)?;
        let last_name = validate_name("last_name", &input.last_name)?;

        let email = non_blank(input.email).map(Email::new).transpose()?;
        let phone = non_blank(input.phone).map(Phone::new).transpose()?;
        if email.is_none() && phone.is_none() {
            return Err(AuthError::Validation("email or phone is required".into()));
        }
        entry.identity = email
            .as_ref()
            .map(|e| e.as_str().to_string())
            .or_else(|| phone.as_ref().map(|p| p.as_str().to_string()));

        if !input.terms_agreed {
            return Err(AuthError::Validation("terms must be agreed to".into()));
        }

        let password = ClearTextPassword::new(input.password)?;

        for identity in email
            .iter()
            .cloned()
            .map(Identity::Email)
            .chain(phone.iter().cloned().map(Identity::Phone))
        {
            if self.repo.identity_exists(&identity).await? {
                return Err(AuthError::IdentityTaken);
            }
        }

        let password_hash = password.hash(self.config.pepper())?;
        let user = User::new(first_name, last_name, email, phone, password_hash, true);
        self.repo.create_user(&user).await?;

        entry.user_id = Some(user.user_id);
        entry.role = Some(user.role.id());

        Ok(SignUpOutput {
            user_id: user.user_id,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_name(field: &str, value: &str) -> AuthResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AuthError::Validation(format!("{field} is required")));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(AuthError::Validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("first_name", "  Ada ").unwrap(), "Ada");
        assert!(validate_name("first_name", "   ").is_err());
        assert!(validate_name("last_name", &"x".repeat(101)).is_err());
    }
}
