// attest-core/src/infrastructure/paths.rs

use crate::infrastructure::error::InfrastructureError;
use std::path::{Component, Path, PathBuf};

/// Resolves a child runbook reference to an existing file.
///
/// Absolute paths and `..` components are rejected outright: children must
/// live under the parent runbook's directory or one of the template roots, so
/// a runbook can never reach outside the trees it was handed. Search order is
/// the parent directory first, then each template root as declared; the first
/// existing file wins.
pub fn resolve_child_path(
    reference: &str,
    parent_runbook: &Path,
    template_roots: &[PathBuf],
) -> Result<PathBuf, InfrastructureError> {
    let child = Path::new(reference);

    if child.is_absolute() {
        return Err(InfrastructureError::PathResolution {
            reference: reference.to_string(),
            reason: "absolute paths are not allowed".to_string(),
            tried: Vec::new(),
        });
    }
    if child
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(InfrastructureError::PathResolution {
            reference: reference.to_string(),
            reason: "parent-directory components ('..') are not allowed".to_string(),
            tried: Vec::new(),
        });
    }

    let parent_dir = parent_runbook.parent().unwrap_or_else(|| Path::new("."));
    let mut tried = Vec::new();

    for base in std::iter::once(parent_dir.to_path_buf()).chain(template_roots.iter().cloned()) {
        let candidate = base.join(child);
        if candidate.is_file() {
            return Ok(candidate);
        }
        tried.push(candidate);
    }

    Err(InfrastructureError::PathResolution {
        reference: reference.to_string(),
        reason: format!(
            "no candidate exists (tried: {})",
            tried
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        tried,
    })
}
