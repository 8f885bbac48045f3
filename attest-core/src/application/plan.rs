// attest-core/src/application/plan.rs

use crate::domain::graph::ExecutionDag;
use crate::domain::runbook::{ArtifactDefinition, Runbook, RunbookConfig};
use crate::domain::schema::Schema;
use std::collections::BTreeMap;

/// A validated, fully resolved plan: flattened artifacts, acyclic dependency
/// graph, and one resolved output schema per artifact.
///
/// Frozen on construction. The executor only reads from it, so a single plan
/// can be executed repeatedly.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    runbook: Runbook,
    dag: ExecutionDag,
    artifacts: BTreeMap<String, ArtifactDefinition>,
    artifact_schemas: BTreeMap<String, Schema>,
    aliases: BTreeMap<String, String>,
    reversed_aliases: BTreeMap<String, String>,
}

impl ExecutionPlan {
    pub(crate) fn new(
        runbook: Runbook,
        dag: ExecutionDag,
        artifacts: BTreeMap<String, ArtifactDefinition>,
        artifact_schemas: BTreeMap<String, Schema>,
        aliases: BTreeMap<String, String>,
    ) -> Self {
        let reversed_aliases = aliases
            .iter()
            .map(|(name, id)| (id.clone(), name.clone()))
            .collect();
        Self {
            runbook,
            dag,
            artifacts,
            artifact_schemas,
            aliases,
            reversed_aliases,
        }
    }

    pub fn runbook(&self) -> &Runbook {
        &self.runbook
    }

    pub fn config(&self) -> &RunbookConfig {
        &self.runbook.config
    }

    pub fn dag(&self) -> &ExecutionDag {
        &self.dag
    }

    pub fn artifacts(&self) -> &BTreeMap<String, ArtifactDefinition> {
        &self.artifacts
    }

    pub fn artifact(&self, id: &str) -> Option<&ArtifactDefinition> {
        self.artifacts.get(id)
    }

    /// Resolved output schema for an artifact.
    pub fn schema_of(&self, id: &str) -> Option<&Schema> {
        self.artifact_schemas.get(id)
    }

    /// parent-facing name -> namespaced id.
    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Parent-facing name of a namespaced id, if it is an exposed child
    /// output.
    pub fn alias_of(&self, id: &str) -> Option<&String> {
        self.reversed_aliases.get(id)
    }

    /// Topological layers: layer N only depends on layers 0..N-1. Used for
    /// plan inspection; the executor schedules from the ready set instead.
    pub fn execution_layers(&self) -> Vec<Vec<String>> {
        let mut layers = Vec::new();
        let mut sorter = self.dag.create_sorter();
        while sorter.is_active() {
            let ready = sorter.get_ready();
            if ready.is_empty() {
                break;
            }
            let layer: Vec<String> = ready.into_iter().collect();
            for id in &layer {
                sorter.done(id);
            }
            layers.push(layer);
        }
        layers
    }
}
