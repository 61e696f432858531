//! Domain Layer
//!
//! - Entities (OtpRecord) and verification outcomes
//! - Domain services (code generation and digests)
//! - Repository traits

pub mod entities;
pub mod repository;
pub mod services;
