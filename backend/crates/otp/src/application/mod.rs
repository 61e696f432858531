//! Application Layer
//!
//! Use cases and application services.

pub mod cleanup_otps;
pub mod config;
pub mod send_otp;
pub mod verify_otp;

// Re-exports
pub use cleanup_otps::{CleanupOtpUseCase, CleanupReport};
pub use config::OtpConfig;
pub use send_otp::{SendOtpInput, SendOtpOutput, SendOtpUseCase, resolve_identity};
pub use verify_otp::VerifyOtpUseCase;
