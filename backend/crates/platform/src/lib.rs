//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (random tokens, SHA-256 digests)
//! - Password hashing (Argon2id, NIST SP 800-63B compliant)
//! - Client metadata extraction (IP, User-Agent, device)
//! - Rate limiting window definitions
//! - Outbound notification providers (SMS / e-mail)

pub mod client;
pub mod crypto;
pub mod notify;
pub mod password;
pub mod rate_limit;
