// attest-core/src/infrastructure/parser.rs

use crate::domain::runbook::{ArtifactSpec, Runbook};
use crate::domain::schema::Schema;
use crate::infrastructure::error::InfrastructureError;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Identifiers for runbooks and artifacts. `__` is reserved as the namespace
/// separator used when child runbooks are flattened, so authored ids may use
/// single underscores and hyphens only.
fn re_identifier() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").unwrap_or_else(|_| {
            // Hardcoded pattern; the fallback never matches anything and only
            // exists to avoid unsafe methods under the lint wall.
            Regex::new("$^").unwrap_or_else(|_| unreachable!())
        })
    })
}

/// Loads and validates one runbook file. Cross-references stay unresolved and
/// child runbook files stay closed; both are the flattener's job.
pub fn load_runbook(path: &Path) -> Result<Runbook, InfrastructureError> {
    let content = fs::read_to_string(path).map_err(|e| {
        InfrastructureError::parse(path, format!("could not read runbook file: {e}"))
    })?;
    parse_runbook_str(&content, path)
}

/// Parses runbook YAML from an in-memory string, attributing errors to
/// `path`.
pub fn parse_runbook_str(content: &str, path: &Path) -> Result<Runbook, InfrastructureError> {
    let runbook: Runbook = serde_yaml::from_str(content)
        .map_err(|e| InfrastructureError::parse(path, e.to_string()))?;
    validate_runbook(&runbook, path)?;
    debug!(
        runbook = %runbook.name,
        artifacts = runbook.artifacts.len(),
        "Runbook parsed"
    );
    Ok(runbook)
}

fn validate_runbook(runbook: &Runbook, path: &Path) -> Result<(), InfrastructureError> {
    let fail = |message: String| Err(InfrastructureError::parse(path, message));

    if runbook.name.trim().is_empty() {
        return fail("`name` must not be empty".into());
    }
    if !re_identifier().is_match(&runbook.name) || runbook.name.contains("__") {
        return fail(format!(
            "`name` '{}' is not a valid identifier (letters, digits, '-', single '_')",
            runbook.name
        ));
    }
    if runbook.description.trim().is_empty() {
        return fail("`description` must not be empty".into());
    }
    if runbook.config.max_concurrency < 1 {
        return fail("`config.max_concurrency` must be at least 1".into());
    }

    for (id, spec) in &runbook.artifacts {
        validate_artifact(id, spec, path)?;
    }
    Ok(())
}

fn validate_artifact(
    id: &str,
    spec: &ArtifactSpec,
    path: &Path,
) -> Result<(), InfrastructureError> {
    let fail = |message: String| {
        Err(InfrastructureError::parse(
            path,
            format!("artifact '{id}': {message}"),
        ))
    };

    if !re_identifier().is_match(id) || id.contains("__") {
        return fail("id is not a valid identifier (letters, digits, '-', single '_')".into());
    }

    // Exactly one variant: source, derived (inputs), or child runbook.
    let variants = [
        spec.source.is_some(),
        spec.inputs.is_some(),
        spec.child_runbook.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count();
    if variants != 1 {
        return fail(
            "exactly one of `source`, `inputs`, `child_runbook` must be set".into(),
        );
    }

    if let Some(inputs) = &spec.inputs {
        if inputs.is_empty() {
            return fail("`inputs` must name at least one upstream artifact".into());
        }
        if spec.process.is_none() {
            return fail("derived artifacts require a `process` block".into());
        }
    } else {
        if spec.process.is_some() {
            return fail("`process` requires `inputs`".into());
        }
        if spec.merge.is_some() {
            return fail("`merge` requires `inputs`".into());
        }
    }

    if let Some(child) = &spec.child_runbook {
        let forms = [child.output.is_some(), child.output_mapping.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if forms != 1 {
            return fail(
                "exactly one of `child_runbook.output`, `child_runbook.output_mapping` must be set"
                    .into(),
            );
        }
        if child
            .output_mapping
            .as_ref()
            .is_some_and(|mapping| mapping.is_empty())
        {
            return fail("`child_runbook.output_mapping` must not be empty".into());
        }
        if spec.output_schema.is_some() {
            return fail("`output_schema` cannot be set on a child runbook reference".into());
        }
    }

    if let Some(reference) = &spec.output_schema {
        if let Err(e) = Schema::parse_ref(reference) {
            return fail(format!(
                "`output_schema` '{reference}' is not a `name/major.minor.patch` reference ({e})"
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::path::PathBuf;

    fn parse(yaml: &str) -> Result<Runbook, InfrastructureError> {
        parse_runbook_str(yaml, &PathBuf::from("test.yaml"))
    }

    #[test]
    fn test_minimal_runbook_parses() -> Result<()> {
        let runbook = parse(
            r#"
name: demo
description: demo runbook
artifacts:
  emails:
    source:
      type: static
      properties:
        content: "hello"
"#,
        )?;
        assert_eq!(runbook.name, "demo");
        assert_eq!(runbook.artifacts.len(), 1);
        Ok(())
    }

    #[test]
    fn test_empty_artifacts_map_is_allowed() -> Result<()> {
        let runbook = parse("name: demo\ndescription: demo runbook\nartifacts: {}\n")?;
        assert!(runbook.artifacts.is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_required_fields_fail() {
        assert!(parse("description: no name\nartifacts: {}\n").is_err());
        assert!(parse("name: demo\nartifacts: {}\n").is_err());
        assert!(parse("name: demo\ndescription: d\n").is_err());
    }

    #[test]
    fn test_variant_exclusion_is_enforced() {
        // Both source and inputs.
        let err = parse(
            r#"
name: demo
description: demo runbook
artifacts:
  both:
    source: { type: static }
    inputs: other
    process: { type: pattern_match }
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("exactly one of"));

        // Neither.
        assert!(
            parse(
                r#"
name: demo
description: demo runbook
artifacts:
  neither:
    description: just metadata
"#,
            )
            .is_err()
        );
    }

    #[test]
    fn test_zero_inputs_rejected_at_parse_time() {
        let err = parse(
            r#"
name: demo
description: demo runbook
artifacts:
  empty:
    inputs: []
    process: { type: pattern_match }
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least one upstream"));
    }

    #[test]
    fn test_inputs_without_process_rejected() {
        assert!(
            parse(
                r#"
name: demo
description: demo runbook
artifacts:
  incomplete:
    inputs: other
"#,
            )
            .is_err()
        );
    }

    #[test]
    fn test_double_underscore_ids_are_reserved() {
        let err = parse(
            r#"
name: demo
description: demo runbook
artifacts:
  bad__id:
    source: { type: static }
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("bad__id"));
    }

    #[test]
    fn test_max_concurrency_zero_rejected() {
        let err = parse(
            r#"
name: demo
description: demo runbook
config:
  max_concurrency: 0
artifacts: {}
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn test_child_output_forms_are_exclusive() {
        let err = parse(
            r#"
name: demo
description: demo runbook
artifacts:
  sub:
    child_runbook:
      path: child.yaml
      output: findings
      output_mapping:
        renamed: findings
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("output_mapping"));
    }

    #[test]
    fn test_output_schema_reference_is_validated() {
        let err = parse(
            r#"
name: demo
description: demo runbook
artifacts:
  emails:
    source: { type: static }
    output_schema: "standard_input/1.0"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("output_schema"));
    }

    #[test]
    fn test_reserialised_runbook_reparses_identically() -> Result<()> {
        let runbook = parse(
            r#"
name: demo
description: demo runbook
artifacts:
  emails:
    source:
      type: static
      properties:
        content: "a@b.c"
  findings:
    inputs: [emails]
    process: { type: pattern_match }
    output: true
    optional: true
"#,
        )?;
        let yaml = serde_yaml::to_string(&runbook)?;
        let reparsed = parse(&yaml)?;
        assert_eq!(runbook, reparsed);
        Ok(())
    }
}
