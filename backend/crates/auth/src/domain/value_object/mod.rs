//! Value Object Module

pub mod api_scope;
pub mod user_role;
pub mod user_status;

pub use kernel::identity::{Email, Identity, Phone};
