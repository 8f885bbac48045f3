// attest-core/src/domain/runbook/model.rs

use crate::domain::schema::{Schema, Version};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A parsed runbook, exactly as authored. Cross-references are not resolved
/// here and child runbook files are not opened; that is plan-time work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Runbook {
    pub name: String,
    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,

    #[serde(default)]
    pub config: RunbookConfig,

    /// Declared only by runbooks meant to be included as children.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, InterfaceEntry>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, InterfaceEntry>,

    pub artifacts: BTreeMap<String, ArtifactSpec>,
}

impl Runbook {
    /// True when the runbook declares the inputs/outputs interface required
    /// of a child runbook.
    pub fn declares_interface(&self) -> bool {
        !self.outputs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunbookConfig {
    /// Overall execution timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Cumulative cost cap across all components.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_limit: Option<f64>,

    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Extra roots searched when resolving child runbook paths, relative to
    /// the runbook's own directory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_paths: Vec<String>,
}

impl Default for RunbookConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            cost_limit: None,
            max_concurrency: default_max_concurrency(),
            template_paths: Vec::new(),
        }
    }
}

fn default_max_concurrency() -> usize {
    10
}

/// One entry of a child runbook's `inputs`/`outputs` interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceEntry {
    pub schema_name: String,
    pub version: Version,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl InterfaceEntry {
    pub fn schema(&self) -> Schema {
        Schema::new(self.schema_name.clone(), self.version)
    }
}

/// One artifact as authored. Exactly one of `source`, `inputs`,
/// `child_runbook` must be set; the parser enforces the exclusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,

    /// Export flag: marks the artifact as a deliverable of the run.
    #[serde(default)]
    pub output: bool,

    /// Failure isolation: a failing optional artifact skips its dependents
    /// instead of aborting the run.
    #[serde(default)]
    pub optional: bool,

    /// `name/major.minor.patch` override of the component's default output
    /// schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<InputsSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessSpec>,

    /// Reserved fan-in hint. Processors already receive every input as an
    /// ordered list, so `concatenate` is the only recognised value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeStrategy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_runbook: Option<ChildRunbookSpec>,
}

/// `inputs` accepts a single id or an ordered list of ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputsSpec {
    Single(String),
    Many(Vec<String>),
}

impl InputsSpec {
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Self::Single(id) => vec![id.clone()],
            Self::Many(ids) => ids.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Many(ids) if ids.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSpec {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessSpec {
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    Concatenate,
}

/// Inclusion of a child runbook. `output` (single exposed output) and
/// `output_mapping` (several, renamed) are mutually exclusive forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChildRunbookSpec {
    pub path: String,

    /// child input name -> parent artifact id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_mapping: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// parent-facing name -> child output name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_mapping: Option<BTreeMap<String, String>>,
}
