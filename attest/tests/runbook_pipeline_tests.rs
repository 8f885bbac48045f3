use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Abstraction for managing a throwaway runbook project on disk.
struct AttestTestEnv {
    _tmp: TempDir,
    root: PathBuf,
}

impl AttestTestEnv {
    fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let root = tmp.path().to_path_buf();
        Ok(Self { _tmp: tmp, root })
    }

    fn write(&self, file: &str, content: &str) -> Result<PathBuf> {
        let path = self.root.join(file);
        fs::write(&path, content)?;
        Ok(path)
    }

    fn attest(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("attest"));
        cmd.current_dir(&self.root);
        cmd
    }
}

#[test]
fn test_run_pattern_analysis_end_to_end() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.write(
        "data.txt",
        "Support contact: alice@example.com\nEscalation: bob@example.org\n",
    )?;
    env.write(
        "runbook.yaml",
        r#"
name: pd-scan
description: scan a text export for personal data
artifacts:
  export:
    source:
      type: file
      properties:
        path: data.txt
  findings:
    inputs: export
    process:
      type: pattern_match
    output: true
"#,
    )?;

    env.attest()
        .args(["run", "runbook.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 succeeded"))
        .stdout(predicate::str::contains("SUCCESS"));
    Ok(())
}

#[test]
fn test_plan_reports_layers_without_running() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.write(
        "runbook.yaml",
        r#"
name: pd-scan
description: layered plan
artifacts:
  export:
    source:
      type: static
      properties:
        content: "x@y.example"
  findings:
    inputs: export
    process:
      type: pattern_match
"#,
    )?;

    env.attest()
        .args(["plan", "runbook.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Layer 1"))
        .stdout(predicate::str::contains("Layer 2"))
        .stdout(predicate::str::contains("Runbook is valid"));
    Ok(())
}

#[test]
fn test_cycle_fails_with_plan_error_exit_code() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.write(
        "runbook.yaml",
        r#"
name: cyclic
description: a depends on b depends on a
artifacts:
  a:
    inputs: b
    process: { type: pattern_match }
  b:
    inputs: a
    process: { type: pattern_match }
"#,
    )?;

    env.attest()
        .args(["run", "runbook.yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Circular dependency"));
    Ok(())
}

#[test]
fn test_unknown_component_fails_with_plan_error_exit_code() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.write(
        "runbook.yaml",
        r#"
name: unknown
description: unregistered component type
artifacts:
  a:
    source: { type: quantum_probe }
"#,
    )?;

    env.attest()
        .args(["run", "runbook.yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("quantum_probe"));
    Ok(())
}

#[test]
fn test_runtime_failure_exits_with_execution_error() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.write(
        "runbook.yaml",
        r#"
name: doomed
description: source file does not exist
artifacts:
  export:
    source:
      type: file
      properties:
        path: missing.txt
"#,
    )?;

    env.attest()
        .args(["run", "runbook.yaml"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("export"));
    Ok(())
}

#[test]
fn test_optional_failure_reports_skip_but_finishes() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.write(
        "runbook.yaml",
        r#"
name: isolated
description: optional branch fails, sibling still runs
artifacts:
  healthy:
    source:
      type: static
      properties:
        content: "ok"
  broken:
    optional: true
    source:
      type: file
      properties:
        path: missing.txt
  downstream:
    inputs: broken
    process: { type: pattern_match }
  findings:
    inputs: healthy
    process: { type: pattern_match }
    output: true
"#,
    )?;

    // One artifact failed, so the run still exits non-zero, but the healthy
    // branch completed and the dependent branch is reported as skipped.
    env.attest()
        .args(["run", "runbook.yaml"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("skipped: upstream artifact 'broken' failed"))
        .stdout(predicate::str::contains("2 succeeded"));
    Ok(())
}

#[test]
fn test_child_runbook_flattens_and_runs() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.write(
        "pd_analysis.yaml",
        r#"
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
"#,
    )?;
    env.write(
        "runbook.yaml",
        r#"
name: parent
description: runs the shared analysis against a local export
artifacts:
  export:
    source:
      type: static
      properties:
        content: "reach me at carol@example.net"
  analysis:
    child_runbook:
      path: pd_analysis.yaml
      input_mapping:
        raw: export
      output: findings
    output: true
"#,
    )?;

    env.attest()
        .args(["run", "runbook.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pd-analysis__"))
        .stdout(predicate::str::contains("2 succeeded"));
    Ok(())
}

#[test]
fn test_components_lists_builtins() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.attest()
        .arg("components")
        .assert()
        .success()
        .stdout(predicate::str::contains("file"))
        .stdout(predicate::str::contains("static"))
        .stdout(predicate::str::contains("pattern_match"));
    Ok(())
}

#[test]
fn test_missing_runbook_file_is_a_plan_error() -> Result<()> {
    let env = AttestTestEnv::new()?;
    env.attest()
        .args(["run", "ghost.yaml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("PLAN ERROR"));
    Ok(())
}
