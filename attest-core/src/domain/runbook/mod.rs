// attest-core/src/domain/runbook/mod.rs

pub mod artifact;
pub mod model;

pub use artifact::{ArtifactDefinition, ArtifactKind, ProcessConfig, SourceConfig};
pub use model::{
    ArtifactSpec, ChildRunbookSpec, InputsSpec, InterfaceEntry, MergeStrategy, ProcessSpec,
    Runbook, RunbookConfig, SourceSpec,
};
