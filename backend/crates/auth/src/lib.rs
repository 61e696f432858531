//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits
//! - `application/` - Use cases and application services
//! - `infra/` - PostgreSQL and in-memory repositories
//! - `presentation/` - HTTP handlers, DTOs, middleware, router
//!
//! ## Features
//! - API-scope tokens for calling services (client id + secret exchange)
//! - Email / phone + password sign-in through admin or customer portals
//! - Short-lived access tokens with rotating refresh-token sessions
//! - Refresh-token reuse detection (revokes the session)
//! - Brute-force lockout with retry-after
//! - Password reset through single-use tokens
//! - Asynchronous, best-effort login audit trail
//!
//! ## Security Model
//! - Passwords and client secrets hashed with Argon2id
//! - Refresh and reset tokens stored only as SHA-256 digests
//! - API-scope and access tokens signed with separate secrets
//! - Every authenticated request re-checks the live role and session

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::{AuthConfig, LockoutPolicy};
pub use error::{AuthError, AuthResult};
pub use infra::{memory::MemoryAuthRepository, postgres::PgAuthRepository};
pub use presentation::{handlers::AuthAppState, router::auth_router};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}
