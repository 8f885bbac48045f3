// attest-core/src/infrastructure/error.rs

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(attest::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    // --- RUNBOOK PARSING ---
    #[error("Runbook parsing failed at {path}: {message}")]
    #[diagnostic(
        code(attest::infra::parse),
        help("Check your YAML syntax (indentation, types) and the runbook field reference.")
    )]
    Parse { path: PathBuf, message: String },

    // --- CHILD PATH RESOLUTION ---
    #[error("Child runbook '{reference}' could not be resolved: {reason}")]
    #[diagnostic(
        code(attest::infra::path_resolution),
        help(
            "Child paths must be relative, must not contain '..', and must exist under the parent runbook's directory or a configured template root."
        )
    )]
    PathResolution {
        reference: String,
        reason: String,
        /// Every candidate probed, in search order. Empty when the reference
        /// was rejected before probing.
        tried: Vec<PathBuf>,
    },
}

impl InfrastructureError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
