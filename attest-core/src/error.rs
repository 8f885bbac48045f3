// attest-core/src/error.rs

use crate::domain::error::DomainError;
use crate::infrastructure::error::InfrastructureError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttestError {
    // --- DOMAIN (contracts, cycles, schema matching) ---
    #[error(transparent)]
    Domain(#[from] DomainError),

    // --- INFRASTRUCTURE (IO, parsing, path resolution) ---
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    // --- APPLICATION / PROGRAMMER ERRORS ---
    #[error("Internal Error: {0}")]
    Internal(String),
}

// Manual implementation to avoid duplicate enum variants but keep ergonomics
impl From<std::io::Error> for AttestError {
    fn from(err: std::io::Error) -> Self {
        AttestError::Infrastructure(InfrastructureError::Io(err))
    }
}
