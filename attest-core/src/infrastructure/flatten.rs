// attest-core/src/infrastructure/flatten.rs

use crate::domain::error::DomainError;
use crate::domain::runbook::{
    ArtifactDefinition, ArtifactKind, ChildRunbookSpec, ProcessConfig, Runbook, SourceConfig,
};
use crate::domain::schema::Schema;
use crate::error::AttestError;
use crate::infrastructure::parser::load_runbook;
use crate::infrastructure::paths::resolve_child_path;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Result of inlining every child runbook into its parent.
///
/// After flattening no `child_runbook` entries remain: the artifact map holds
/// only source and derived definitions, every id is unique, and every input
/// reference points at a key of the map (or is a typo the planner reports).
#[derive(Debug, Clone)]
pub struct FlattenedRunbook {
    pub artifacts: BTreeMap<String, ArtifactDefinition>,

    /// parent-facing output name -> namespaced child artifact id.
    pub aliases: BTreeMap<String, String>,
}

/// Recursively inlines child runbooks, assigning each inclusion a fresh
/// `<child_name>__<uuid>__` namespace so the same child can be used any
/// number of times without id collisions.
pub fn flatten(runbook: &Runbook, runbook_path: &Path) -> Result<FlattenedRunbook, AttestError> {
    let mut stack = vec![normalise(runbook_path)];
    let flat = flatten_inner(runbook, runbook_path, &mut stack)?;
    debug!(
        runbook = %runbook.name,
        artifacts = flat.artifacts.len(),
        aliases = flat.aliases.len(),
        "Runbook flattened"
    );
    Ok(flat)
}

fn normalise(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn flatten_inner(
    runbook: &Runbook,
    runbook_path: &Path,
    stack: &mut Vec<PathBuf>,
) -> Result<FlattenedRunbook, AttestError> {
    let fail = |reason: String| {
        Err(AttestError::Domain(DomainError::Flatten {
            runbook: runbook.name.clone(),
            reason,
        }))
    };

    let parent_dir = runbook_path.parent().unwrap_or_else(|| Path::new("."));
    let template_roots: Vec<PathBuf> = runbook
        .config
        .template_paths
        .iter()
        .map(|root| parent_dir.join(root))
        .collect();

    let mut artifacts: BTreeMap<String, ArtifactDefinition> = BTreeMap::new();
    let mut aliases: BTreeMap<String, String> = BTreeMap::new();

    for (id, spec) in &runbook.artifacts {
        let Some(child_ref) = &spec.child_runbook else {
            let output_schema = spec
                .output_schema
                .as_deref()
                .map(Schema::parse_ref)
                .transpose()?;
            let kind = if let Some(source) = &spec.source {
                ArtifactKind::Source(SourceConfig::from(source))
            } else if let (Some(inputs), Some(process)) = (&spec.inputs, &spec.process) {
                ArtifactKind::Derived {
                    inputs: inputs.as_list(),
                    process: ProcessConfig::from(process),
                    merge: spec.merge,
                }
            } else {
                // The parser enforces the variant exclusion; reaching this is
                // a programming error upstream.
                return fail(format!("artifact '{id}' has no recognisable variant"));
            };
            artifacts.insert(
                id.clone(),
                ArtifactDefinition::from_spec(id.clone(), spec, output_schema, kind),
            );
            continue;
        };

        // --- CHILD INCLUSION ---
        let child_path = resolve_child_path(&child_ref.path, runbook_path, &template_roots)?;
        let canonical = normalise(&child_path);
        if stack.contains(&canonical) {
            return fail(format!(
                "recursive inclusion of '{}' via artifact '{id}'",
                child_path.display()
            ));
        }

        let child = load_runbook(&child_path)?;
        if !child.declares_interface() {
            return fail(format!(
                "child runbook '{}' declares no outputs interface",
                child.name
            ));
        }

        // The mapping must cover the declared inputs exactly: nothing
        // missing, nothing invented.
        let declared: BTreeSet<&String> = child.inputs.keys().collect();
        let mapped: BTreeSet<&String> = child_ref.input_mapping.keys().collect();
        let missing: Vec<&str> = declared
            .difference(&mapped)
            .map(|name| name.as_str())
            .collect();
        if !missing.is_empty() {
            return fail(format!(
                "input_mapping for child '{}' is missing declared inputs: [{}]",
                child.name,
                missing.join(", ")
            ));
        }
        let unknown: Vec<&str> = mapped
            .difference(&declared)
            .map(|name| name.as_str())
            .collect();
        if !unknown.is_empty() {
            return fail(format!(
                "input_mapping for child '{}' maps undeclared inputs: [{}]",
                child.name,
                unknown.join(", ")
            ));
        }

        let exposed = exposed_outputs(child_ref);
        for (_, child_output) in &exposed {
            if !child.outputs.contains_key(child_output) {
                return fail(format!(
                    "'{child_output}' is not a declared output of child '{}'",
                    child.name
                ));
            }
        }

        stack.push(canonical);
        let sub = flatten_inner(&child, &child_path, stack)?;
        stack.pop();

        let sub_ids: BTreeSet<String> = sub.artifacts.keys().cloned().collect();
        let namespace = format!("{}__{}", child.name, Uuid::new_v4());

        for (child_id, mut definition) in sub.artifacts {
            let namespaced_id = format!("{namespace}__{child_id}");
            definition.id = namespaced_id.clone();
            if spec.optional {
                // Failure isolation declared on the inclusion covers the
                // whole inlined subtree.
                definition.optional = true;
            }
            if let ArtifactKind::Derived { inputs, .. } = &mut definition.kind {
                for input in inputs.iter_mut() {
                    if sub_ids.contains(input) {
                        *input = format!("{namespace}__{input}");
                    } else if child.inputs.contains_key(input.as_str()) {
                        let Some(target) = child_ref.input_mapping.get(input.as_str()) else {
                            return fail(format!(
                                "declared input '{input}' of child '{}' has no mapping",
                                child.name
                            ));
                        };
                        *input = target.clone();
                    } else {
                        return fail(format!(
                            "artifact '{child_id}' of child '{}' references '{input}', which is neither a child artifact nor a declared input",
                            child.name
                        ));
                    }
                }
            }
            if artifacts.insert(namespaced_id.clone(), definition).is_some() {
                return fail(format!("namespaced id '{namespaced_id}' is not unique"));
            }
        }

        for (parent_name, child_output) in exposed {
            let target_in_child = if sub_ids.contains(&child_output) {
                child_output.clone()
            } else if let Some(target) = sub.aliases.get(&child_output) {
                target.clone()
            } else {
                return fail(format!(
                    "declared output '{child_output}' does not name an artifact of child '{}'",
                    child.name
                ));
            };
            let namespaced_target = format!("{namespace}__{target_in_child}");
            if spec.output
                && let Some(definition) = artifacts.get_mut(&namespaced_target)
            {
                definition.output = true;
            }
            if aliases
                .insert(parent_name.clone(), namespaced_target)
                .is_some()
            {
                return fail(format!(
                    "alias '{parent_name}' is exposed more than once; use output_mapping to rename"
                ));
            }
        }
    }

    // Parent-scope references to exposed child outputs resolve through the
    // aliases; everything else is left for the planner's reference check.
    for definition in artifacts.values_mut() {
        if let ArtifactKind::Derived { inputs, .. } = &mut definition.kind {
            for input in inputs.iter_mut() {
                if let Some(target) = aliases.get(input) {
                    *input = target.clone();
                }
            }
        }
    }

    for alias in aliases.keys() {
        if artifacts.contains_key(alias) {
            return fail(format!("alias '{alias}' collides with an artifact id"));
        }
        if runbook.inputs.contains_key(alias) {
            return fail(format!("alias '{alias}' collides with a declared input"));
        }
    }

    Ok(FlattenedRunbook { artifacts, aliases })
}

fn exposed_outputs(child_ref: &ChildRunbookSpec) -> Vec<(String, String)> {
    match (&child_ref.output, &child_ref.output_mapping) {
        (Some(single), None) => vec![(single.clone(), single.clone())],
        (None, Some(mapping)) => mapping
            .iter()
            .map(|(parent_name, child_output)| (parent_name.clone(), child_output.clone()))
            .collect(),
        // The parser enforces the exclusion; an inconsistent reference
        // exposes nothing rather than guessing.
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::infrastructure::parser::parse_runbook_str;
    use anyhow::Result;
    use std::fs;
    use tempfile::TempDir;

    const CHILD_YAML: &str = r#"
name: pd-analysis
description: reusable personal data analysis
inputs:
  raw:
    schema_name: standard_input
    version: "1.0.0"
outputs:
  findings:
    schema_name: personal_data_finding
    version: "1.0.0"
artifacts:
  findings:
    inputs: raw
    process:
      type: pattern_match
"#;

    fn write_runbook(dir: &TempDir, file: &str, yaml: &str) -> PathBuf {
        let path = dir.path().join(file);
        fs::write(&path, yaml).unwrap();
        path
    }

    fn parse(yaml: &str, path: &Path) -> Runbook {
        parse_runbook_str(yaml, path).unwrap()
    }

    #[test]
    fn test_flat_runbook_passes_through() -> Result<()> {
        let dir = TempDir::new()?;
        let yaml = r#"
name: demo
description: demo runbook
artifacts:
  emails:
    source: { type: static }
  findings:
    inputs: emails
    process: { type: pattern_match }
"#;
        let path = write_runbook(&dir, "main.yaml", yaml);
        let runbook = parse(yaml, &path);

        let flat = flatten(&runbook, &path)?;
        assert_eq!(flat.artifacts.len(), 2);
        assert!(flat.aliases.is_empty());
        assert_eq!(
            flat.artifacts["findings"].dependencies(),
            ["emails".to_string()]
        );
        Ok(())
    }

    #[test]
    fn test_flattening_is_idempotent_on_flat_runbooks() -> Result<()> {
        let dir = TempDir::new()?;
        let yaml = r#"
name: demo
description: demo runbook
artifacts:
  emails:
    source: { type: static }
"#;
        let path = write_runbook(&dir, "main.yaml", yaml);
        let runbook = parse(yaml, &path);

        let first = flatten(&runbook, &path)?;
        let second = flatten(&runbook, &path)?;
        assert_eq!(first.artifacts, second.artifacts);
        assert_eq!(first.aliases, second.aliases);
        Ok(())
    }

    #[test]
    fn test_child_inclusion_namespaces_and_rewires() -> Result<()> {
        let dir = TempDir::new()?;
        write_runbook(&dir, "child.yaml", CHILD_YAML);
        let parent_yaml = r#"
name: parent
description: parent runbook
artifacts:
  parent_source:
    source: { type: static }
  analysis:
    child_runbook:
      path: child.yaml
      input_mapping:
        raw: parent_source
      output: findings
"#;
        let path = write_runbook(&dir, "main.yaml", parent_yaml);
        let runbook = parse(parent_yaml, &path);

        let flat = flatten(&runbook, &path)?;
        assert_eq!(flat.artifacts.len(), 2);

        let target = flat.aliases.get("findings").expect("alias registered");
        assert!(target.starts_with("pd-analysis__"));
        assert!(target.ends_with("__findings"));

        let child_findings = &flat.artifacts[target];
        assert_eq!(
            child_findings.dependencies(),
            ["parent_source".to_string()],
            "declared input must be rewired to the mapped parent artifact"
        );
        Ok(())
    }

    #[test]
    fn test_parent_can_consume_exposed_output() -> Result<()> {
        let dir = TempDir::new()?;
        write_runbook(&dir, "child.yaml", CHILD_YAML);
        let parent_yaml = r#"
name: parent
description: parent runbook
artifacts:
  parent_source:
    source: { type: static }
  analysis:
    child_runbook:
      path: child.yaml
      input_mapping:
        raw: parent_source
      output: findings
  report:
    inputs: findings
    process: { type: report }
"#;
        let path = write_runbook(&dir, "main.yaml", parent_yaml);
        let runbook = parse(parent_yaml, &path);

        let flat = flatten(&runbook, &path)?;
        let target = flat.aliases["findings"].clone();
        assert_eq!(flat.artifacts["report"].dependencies(), [target]);
        Ok(())
    }

    #[test]
    fn test_same_child_twice_yields_disjoint_subgraphs() -> Result<()> {
        let dir = TempDir::new()?;
        write_runbook(&dir, "child.yaml", CHILD_YAML);
        let parent_yaml = r#"
name: parent
description: parent runbook
artifacts:
  parent_source:
    source: { type: static }
  first:
    child_runbook:
      path: child.yaml
      input_mapping:
        raw: parent_source
      output_mapping:
        first_findings: findings
  second:
    child_runbook:
      path: child.yaml
      input_mapping:
        raw: parent_source
      output_mapping:
        second_findings: findings
"#;
        let path = write_runbook(&dir, "main.yaml", parent_yaml);
        let runbook = parse(parent_yaml, &path);

        let flat = flatten(&runbook, &path)?;
        assert_eq!(flat.artifacts.len(), 3);
        assert_eq!(flat.aliases.len(), 2);
        assert_ne!(
            flat.aliases["first_findings"], flat.aliases["second_findings"],
            "each inclusion gets its own namespace"
        );
        Ok(())
    }

    #[test]
    fn test_missing_input_mapping_fails() -> Result<()> {
        let dir = TempDir::new()?;
        write_runbook(&dir, "child.yaml", CHILD_YAML);
        let parent_yaml = r#"
name: parent
description: parent runbook
artifacts:
  analysis:
    child_runbook:
      path: child.yaml
      output: findings
"#;
        let path = write_runbook(&dir, "main.yaml", parent_yaml);
        let runbook = parse(parent_yaml, &path);

        let err = flatten(&runbook, &path).unwrap_err();
        assert!(err.to_string().contains("missing declared inputs"));
        Ok(())
    }

    #[test]
    fn test_unknown_input_mapping_fails() -> Result<()> {
        let dir = TempDir::new()?;
        write_runbook(&dir, "child.yaml", CHILD_YAML);
        let parent_yaml = r#"
name: parent
description: parent runbook
artifacts:
  parent_source:
    source: { type: static }
  analysis:
    child_runbook:
      path: child.yaml
      input_mapping:
        raw: parent_source
        ghost: parent_source
      output: findings
"#;
        let path = write_runbook(&dir, "main.yaml", parent_yaml);
        let runbook = parse(parent_yaml, &path);

        let err = flatten(&runbook, &path).unwrap_err();
        assert!(err.to_string().contains("undeclared inputs"));
        Ok(())
    }

    #[test]
    fn test_undeclared_output_fails() -> Result<()> {
        let dir = TempDir::new()?;
        write_runbook(&dir, "child.yaml", CHILD_YAML);
        let parent_yaml = r#"
name: parent
description: parent runbook
artifacts:
  parent_source:
    source: { type: static }
  analysis:
    child_runbook:
      path: child.yaml
      input_mapping:
        raw: parent_source
      output: ghost
"#;
        let path = write_runbook(&dir, "main.yaml", parent_yaml);
        let runbook = parse(parent_yaml, &path);

        let err = flatten(&runbook, &path).unwrap_err();
        assert!(err.to_string().contains("not a declared output"));
        Ok(())
    }

    #[test]
    fn test_child_without_interface_fails() -> Result<()> {
        let dir = TempDir::new()?;
        write_runbook(
            &dir,
            "child.yaml",
            r#"
name: bare
description: no interface
artifacts:
  emails:
    source: { type: static }
"#,
        );
        let parent_yaml = r#"
name: parent
description: parent runbook
artifacts:
  analysis:
    child_runbook:
      path: child.yaml
      output: emails
"#;
        let path = write_runbook(&dir, "main.yaml", parent_yaml);
        let runbook = parse(parent_yaml, &path);

        let err = flatten(&runbook, &path).unwrap_err();
        assert!(err.to_string().contains("declares no outputs interface"));
        Ok(())
    }

    #[test]
    fn test_recursive_inclusion_is_detected() -> Result<()> {
        let dir = TempDir::new()?;
        let recursive_yaml = r#"
name: recursive
description: includes itself
outputs:
  findings:
    schema_name: personal_data_finding
    version: "1.0.0"
artifacts:
  inner:
    child_runbook:
      path: recursive.yaml
      output: findings
"#;
        let path = write_runbook(&dir, "recursive.yaml", recursive_yaml);
        let runbook = parse(recursive_yaml, &path);

        let err = flatten(&runbook, &path).unwrap_err();
        assert!(err.to_string().contains("recursive inclusion"));
        Ok(())
    }

    #[test]
    fn test_optional_inclusion_marks_subtree_optional() -> Result<()> {
        let dir = TempDir::new()?;
        write_runbook(&dir, "child.yaml", CHILD_YAML);
        let parent_yaml = r#"
name: parent
description: parent runbook
artifacts:
  parent_source:
    source: { type: static }
  analysis:
    optional: true
    child_runbook:
      path: child.yaml
      input_mapping:
        raw: parent_source
      output: findings
"#;
        let path = write_runbook(&dir, "main.yaml", parent_yaml);
        let runbook = parse(parent_yaml, &path);

        let flat = flatten(&runbook, &path)?;
        let target = &flat.aliases["findings"];
        assert!(flat.artifacts[target].optional);
        Ok(())
    }

    #[test]
    fn test_nested_children_flatten_recursively() -> Result<()> {
        let dir = TempDir::new()?;
        write_runbook(&dir, "leaf.yaml", CHILD_YAML);
        write_runbook(
            &dir,
            "middle.yaml",
            r#"
name: middle
description: wraps the leaf analysis
inputs:
  raw:
    schema_name: standard_input
    version: "1.0.0"
outputs:
  findings:
    schema_name: personal_data_finding
    version: "1.0.0"
artifacts:
  leaf:
    child_runbook:
      path: leaf.yaml
      input_mapping:
        raw: raw
      output: findings
"#,
        );
        let parent_yaml = r#"
name: parent
description: parent runbook
artifacts:
  parent_source:
    source: { type: static }
  analysis:
    child_runbook:
      path: middle.yaml
      input_mapping:
        raw: parent_source
      output: findings
"#;
        let path = write_runbook(&dir, "main.yaml", parent_yaml);
        let runbook = parse(parent_yaml, &path);

        let flat = flatten(&runbook, &path)?;
        // parent_source + the leaf's findings artifact, namespaced twice.
        assert_eq!(flat.artifacts.len(), 2);
        let target = &flat.aliases["findings"];
        assert!(target.starts_with("middle__"));
        assert!(target.contains("__pd-analysis__"));
        assert_eq!(
            flat.artifacts[target].dependencies(),
            ["parent_source".to_string()]
        );
        Ok(())
    }
}
