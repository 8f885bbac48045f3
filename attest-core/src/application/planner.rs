// attest-core/src/application/planner.rs

use crate::application::plan::ExecutionPlan;
use crate::domain::error::DomainError;
use crate::domain::graph::ExecutionDag;
use crate::domain::runbook::{ArtifactDefinition, ArtifactKind, Runbook};
use crate::domain::schema::{InputRequirement, Schema};
use crate::error::AttestError;
use crate::infrastructure::flatten::flatten;
use crate::infrastructure::parser::load_runbook;
use crate::ports::ComponentRegistry;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Compiles a runbook file into an [`ExecutionPlan`].
///
/// Fail-fast pipeline: parse, flatten, graph validation, reference
/// resolution, component lookup, schema resolution. A plan that comes out of
/// here can be executed without any component ever being consulted about
/// wiring again.
pub struct Planner;

impl Planner {
    #[instrument(skip(registry), fields(path = %runbook_path.display()))]
    pub fn plan(
        runbook_path: &Path,
        registry: &ComponentRegistry,
    ) -> Result<ExecutionPlan, AttestError> {
        let runbook = load_runbook(runbook_path)?;
        Self::plan_runbook(runbook, runbook_path, registry)
    }

    /// Plans an already parsed runbook. `runbook_path` anchors child runbook
    /// resolution.
    pub fn plan_runbook(
        runbook: Runbook,
        runbook_path: &Path,
        registry: &ComponentRegistry,
    ) -> Result<ExecutionPlan, AttestError> {
        let flat = flatten(&runbook, runbook_path)?;

        let dag = ExecutionDag::build(&flat.artifacts);
        dag.validate()?;

        for (id, definition) in &flat.artifacts {
            for dependency in definition.dependencies() {
                if !flat.artifacts.contains_key(dependency) {
                    return Err(DomainError::UnknownReference {
                        artifact: id.clone(),
                        reference: dependency.clone(),
                    }
                    .into());
                }
            }
        }

        // Schemas resolve bottom-up: a derived artifact needs every upstream
        // schema settled before its own requirements can be matched.
        let mut schemas: BTreeMap<String, Schema> = BTreeMap::new();
        let mut sorter = dag.create_sorter();
        while sorter.is_active() {
            let ready = sorter.get_ready();
            if ready.is_empty() {
                break;
            }
            for id in ready {
                let definition = flat.artifacts.get(&id).ok_or_else(|| {
                    AttestError::Internal(format!("artifact '{id}' vanished during planning"))
                })?;
                let schema = Self::resolve_schema(&id, definition, &schemas, registry)?;
                debug!(artifact = %id, schema = %schema, "Schema resolved");
                schemas.insert(id.clone(), schema);
                sorter.done(&id);
            }
        }

        info!(
            runbook = %runbook.name,
            artifacts = flat.artifacts.len(),
            "Execution plan ready"
        );
        Ok(ExecutionPlan::new(
            runbook,
            dag,
            flat.artifacts,
            schemas,
            flat.aliases,
        ))
    }

    fn resolve_schema(
        id: &str,
        definition: &ArtifactDefinition,
        resolved: &BTreeMap<String, Schema>,
        registry: &ComponentRegistry,
    ) -> Result<Schema, AttestError> {
        match &definition.kind {
            ArtifactKind::Source(config) => {
                let factory = registry
                    .get_source_factory(&config.type_name)
                    .ok_or_else(|| DomainError::ComponentNotFound {
                        kind: "source",
                        type_name: config.type_name.clone(),
                        artifact: id.to_string(),
                    })?;
                Self::output_schema(
                    id,
                    &config.type_name,
                    definition.output_schema.as_ref(),
                    factory.default_output_schema(),
                    factory.supported_output_schemas(),
                )
            }
            ArtifactKind::Derived { inputs, process, .. } => {
                let factory = registry
                    .get_processor_factory(&process.type_name)
                    .ok_or_else(|| DomainError::ComponentNotFound {
                        kind: "processor",
                        type_name: process.type_name.clone(),
                        artifact: id.to_string(),
                    })?;

                let mut provided: BTreeSet<Schema> = BTreeSet::new();
                for input in inputs {
                    let schema = resolved.get(input).ok_or_else(|| {
                        AttestError::Internal(format!(
                            "schema of '{input}' unresolved while planning '{id}'"
                        ))
                    })?;
                    provided.insert(schema.clone());
                }

                // Exact set equality over the unique upstream schemas; the
                // first declared combination that matches wins.
                let requirements = factory.input_requirements();
                let selected = requirements.iter().find(|combination| {
                    let wanted: BTreeSet<Schema> = combination
                        .iter()
                        .map(InputRequirement::schema)
                        .collect();
                    wanted == provided
                });
                let Some(selected) = selected else {
                    return Err(DomainError::InputMismatch {
                        artifact: id.to_string(),
                        provided: provided
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", "),
                        declared: requirements
                            .iter()
                            .map(|combination| {
                                format!(
                                    "{{{}}}",
                                    combination
                                        .iter()
                                        .map(ToString::to_string)
                                        .collect::<Vec<_>>()
                                        .join(", ")
                                )
                            })
                            .collect::<Vec<_>>()
                            .join(" | "),
                    }
                    .into());
                };

                for requirement in selected {
                    let schema = requirement.schema();
                    if factory.resolve_reader(&schema).is_none() {
                        return Err(DomainError::ReaderNotFound {
                            artifact: id.to_string(),
                            schema: schema.to_string(),
                        }
                        .into());
                    }
                }

                Self::output_schema(
                    id,
                    &process.type_name,
                    definition.output_schema.as_ref(),
                    factory.default_output_schema(),
                    factory.supported_output_schemas(),
                )
            }
        }
    }

    fn output_schema(
        id: &str,
        type_name: &str,
        requested: Option<&Schema>,
        default: Schema,
        supported: Vec<Schema>,
    ) -> Result<Schema, AttestError> {
        match requested {
            Some(requested) => {
                if !supported.contains(requested) {
                    return Err(DomainError::SchemaOverride {
                        artifact: id.to_string(),
                        schema: requested.to_string(),
                        type_name: type_name.to_string(),
                    }
                    .into());
                }
                Ok(requested.clone())
            }
            None => Ok(default),
        }
    }
}
