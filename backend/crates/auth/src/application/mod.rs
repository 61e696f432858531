//! Application Layer
//!
//! Use cases and application services.

pub mod account;
pub mod audit;
pub mod check_access;
pub mod config;
pub mod issue_api_token;
pub mod lockout;
pub mod password_reset;
pub mod refresh;
pub mod role_cache;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;
pub mod token_codec;

// Re-exports
pub use account::{CurrentUser, CurrentUserUseCase, ListSessionsUseCase, SessionView};
pub use audit::AuditRecorder;
pub use check_access::{AuthenticatedUser, CheckAccessUseCase};
pub use config::{AuthConfig, LockoutPolicy};
pub use issue_api_token::{IssueApiTokenOutput, IssueApiTokenUseCase};
pub use lockout::LockoutGuard;
pub use password_reset::PasswordResetUseCase;
pub use refresh::{RefreshOutput, RefreshSessionUseCase};
pub use role_cache::RoleCache;
pub use sign_in::{LoginPortal, SignInInput, SignInOutput, SignInUseCase};
pub use sign_out::SignOutUseCase;
pub use sign_up::{SignUpInput, SignUpOutput, SignUpUseCase};
pub use token_codec::{AccessClaims, ApiClaims, IssuedToken, TokenCodec};
