// attest-core/src/domain/runbook/artifact.rs

use crate::domain::runbook::model::{ArtifactSpec, MergeStrategy, ProcessSpec, SourceSpec};
use crate::domain::schema::Schema;
use serde_json::Value;
use std::collections::BTreeMap;

/// Connector invocation: which source component to run and with what.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub type_name: String,
    pub properties: BTreeMap<String, Value>,
}

impl From<&SourceSpec> for SourceConfig {
    fn from(spec: &SourceSpec) -> Self {
        Self {
            type_name: spec.type_name.clone(),
            properties: spec.properties.clone(),
        }
    }
}

/// Analyser invocation: which processor component to run and with what.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    pub type_name: String,
    pub properties: BTreeMap<String, Value>,
}

impl From<&ProcessSpec> for ProcessConfig {
    fn from(spec: &ProcessSpec) -> Self {
        Self {
            type_name: spec.type_name.clone(),
            properties: spec.properties.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactKind {
    /// Produces a message from an external data source.
    Source(SourceConfig),

    /// Consumes upstream messages, in the order authored, and applies a
    /// processor.
    Derived {
        inputs: Vec<String>,
        process: ProcessConfig,
        merge: Option<MergeStrategy>,
    },
}

/// The compiled form of one artifact after flattening. Child references never
/// reach this type; they are expanded away at plan time.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactDefinition {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub contact: Option<String>,
    pub output: bool,
    pub optional: bool,
    pub output_schema: Option<Schema>,
    pub kind: ArtifactKind,
}

impl ArtifactDefinition {
    /// Direct dependency ids, in authored order. Empty for sources.
    pub fn dependencies(&self) -> &[String] {
        match &self.kind {
            ArtifactKind::Source(_) => &[],
            ArtifactKind::Derived { inputs, .. } => inputs,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self.kind, ArtifactKind::Source(_))
    }

    /// Builds the compiled definition for a non-child spec. The caller has
    /// already checked the variant exclusion and parsed the schema override.
    pub fn from_spec(
        id: String,
        spec: &ArtifactSpec,
        output_schema: Option<Schema>,
        kind: ArtifactKind,
    ) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            description: spec.description.clone(),
            contact: spec.contact.clone(),
            output: spec.output,
            optional: spec.optional,
            output_schema,
            kind,
        }
    }
}
