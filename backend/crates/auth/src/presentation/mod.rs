//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::AuthAppState;
pub use middleware::{
    API_TOKEN_HEADER, ClientMeta, authorize_api_scope, record_rejected, require_admin_api,
    require_api_scope, require_user, require_user_api,
};
pub use router::auth_router;
