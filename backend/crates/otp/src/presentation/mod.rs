//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::OtpAppState;
pub use middleware::{require_admin_api, require_api_scope};
pub use router::otp_router;
