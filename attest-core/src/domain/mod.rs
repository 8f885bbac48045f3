// attest-core/src/domain/mod.rs

pub mod error;
pub mod graph;
pub mod message;
pub mod runbook;
pub mod schema;

// Convenience re-export so callers can write `use attest_core::domain::DomainError;`
pub use error::DomainError;
