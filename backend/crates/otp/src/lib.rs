//! OTP (One-Time Passcode) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - OtpRecord, code digests, repository traits
//! - `application/` - Send / verify / cleanup use cases
//! - `infra/` - PostgreSQL and in-memory repositories
//! - `presentation/` - HTTP handlers, DTOs, middleware, router
//!
//! ## Security Model
//! - Codes are stored only as identity-bound SHA-256 digests
//! - Sends are rate limited per identity over a rolling window
//! - A code verifies at most once and is discarded after repeated misses
//! - Routes require an API-scope token; cleanup requires the admin scope

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::OtpConfig;
pub use error::{OtpError, OtpResult};
pub use infra::{memory::MemoryOtpRepository, postgres::PgOtpRepository};
pub use presentation::{handlers::OtpAppState, router::otp_router};

#[cfg(test)]
mod tests;
