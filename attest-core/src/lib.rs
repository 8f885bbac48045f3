// attest-core/src/lib.rs

//! Core of the attest orchestrator: runbook parsing and flattening, plan
//! compilation, and concurrent DAG execution. The CLI and any embedding host
//! live outside this crate and talk to it through the `application` facade
//! and the component traits in `ports`.

#![deny(unsafe_code)]
#![allow(missing_docs)] // Doc coverage is tracked but not enforced yet
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::perf)]

// Pure business types: schemas, messages, the runbook model and the
// execution DAG. No IO, no dependency on the other layers.
pub mod domain;

// Contracts for external components (Source, Processor, Reader) plus the
// registry that serves them to the planner and executor.
pub mod ports;

// IO adapters: YAML parsing, child path resolution, flattening, and the
// built-in reference components.
pub mod infrastructure;

// Use cases wired from the layers above: Planner, DagExecutor,
// ArtifactStore.
pub mod application;

pub mod error;

// Shorthand for callers: `use attest_core::AttestError;`
pub use error::AttestError;
