//! Domain Layer
//!
//! Contains entities, value objects, and repository traits.

pub mod entity;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{
    api_credential::ApiCredential, user::User, user_session::UserSession,
};
pub use repository::{
    ApiCredentialRepository, AuditLogRepository, AuthStore, FailedAttemptRepository,
    PasswordResetRepository, RoleRepository, SessionRepository, UserRepository,
};
