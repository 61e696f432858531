//! Entity Module

pub mod api_credential;
pub mod audit_log;
pub mod failed_attempt;
pub mod password_reset;
pub mod user;
pub mod user_session;
