// attest-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Circular dependency detected involving: {nodes}")]
    #[diagnostic(
        code(attest::domain::cycle),
        help("Check the `inputs` references of the artifacts listed.")
    )]
    CircularDependency { nodes: String },

    #[error("Artifact '{artifact}' references unknown input '{reference}'")]
    #[diagnostic(code(attest::domain::unknown_reference))]
    UnknownReference { artifact: String, reference: String },

    #[error("Unknown {kind} type '{type_name}' required by artifact '{artifact}'")]
    #[diagnostic(
        code(attest::domain::component_not_found),
        help("Register the component at bootstrap, or fix the `type` field.")
    )]
    ComponentNotFound {
        kind: &'static str,
        type_name: String,
        artifact: String,
    },

    #[error(
        "Input schemas for artifact '{artifact}' match no declared combination. Provided: {{{provided}}}. Declared: [{declared}]"
    )]
    #[diagnostic(code(attest::domain::input_match))]
    InputMismatch {
        artifact: String,
        provided: String,
        declared: String,
    },

    #[error(
        "Output schema override '{schema}' on artifact '{artifact}' is not supported by component '{type_name}'"
    )]
    #[diagnostic(code(attest::domain::schema_override))]
    SchemaOverride {
        artifact: String,
        schema: String,
        type_name: String,
    },

    #[error("No reader available for schema '{schema}' required by artifact '{artifact}'")]
    #[diagnostic(code(attest::domain::reader_not_found))]
    ReaderNotFound { artifact: String, schema: String },

    #[error("Invalid version '{0}': expected strict `major.minor.patch`")]
    #[diagnostic(code(attest::domain::version))]
    InvalidVersion(String),

    #[error("Message produced for artifact '{artifact}' failed validation: {reason}")]
    #[diagnostic(code(attest::domain::validation))]
    Validation { artifact: String, reason: String },

    #[error("Flattening of runbook '{runbook}' failed: {reason}")]
    #[diagnostic(code(attest::domain::flatten))]
    Flatten { runbook: String, reason: String },
}
