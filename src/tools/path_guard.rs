//! Workspace boundary checks for tool arguments.

use std::path::{Component, Path, PathBuf};

use crate::{AppError, Result};

/// Resolve `candidate` against `workspace_root`, refusing anything outside it.
///
/// Relative paths are joined to the root; `..` segments are folded without
/// touching the file system. When the resolved path exists it is
/// canonicalized so a symlink cannot point out of the workspace.
///
/// # Errors
///
/// Returns `AppError::Tool` if the root cannot be canonicalized or the path
/// escapes it.
pub fn resolve_in_workspace(workspace_root: &Path, candidate: impl AsRef<Path>) -> Result<PathBuf> {
    let root = workspace_root
        .canonicalize()
        .map_err(|err| AppError::Tool(format!("workspace root invalid: {err}")))?;

    let candidate = candidate.as_ref();
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(AppError::Tool("path escapes the filesystem root".into()));
                }
            }
            Component::CurDir => {}
            other => resolved.push(other),
        }
    }

    if !resolved.starts_with(&root) {
        return Err(AppError::Tool(format!(
            "path {} is outside the workspace",
            candidate.display()
        )));
    }

    if !resolved.exists() {
        return Ok(resolved);
    }

    let canonical = resolved
        .canonicalize()
        .map_err(|err| AppError::Tool(format!("cannot resolve path: {err}")))?;
    if canonical.starts_with(&root) {
        Ok(canonical)
    } else {
        Err(AppError::Tool("symlink target escapes the workspace".into()))
    }
}
