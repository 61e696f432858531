//! Infrastructure Layer

pub mod memory;
pub mod postgres;

pub use memory::MemoryOtpRepository;
pub use postgres::PgOtpRepository;
