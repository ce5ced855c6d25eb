//! Discovery lock files.
//!
//! A running bridge advertises itself by writing a small JSON document to
//! `<dir>/<workspace key>.json`, where the key is derived from the
//! canonical workspace path. An external wrapper started in the same
//! workspace computes the same path to find the port.
//!
//! ```json
//! {"port": 51234, "workspace": "/home/me/project", "pid": 4242, "timestamp": "2026-10-19T08:00:00Z"}
//! ```

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{AppError, Result};

/// Hex characters of the workspace digest used in the file name.
const KEY_LEN: usize = 16;

/// Contents of a discovery lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    /// Port the bridge listens on (loopback).
    pub port: u16,
    /// Workspace root served by the bridge.
    pub workspace: PathBuf,
    /// Process id of the owning editor.
    pub pid: u32,
    /// When the lock file was written.
    pub timestamp: DateTime<Utc>,
}

impl LockFile {
    /// Describe the current process serving `workspace` on `port`.
    #[must_use]
    pub fn for_current_process(port: u16, workspace: &Path) -> Self {
        Self {
            port,
            workspace: workspace.to_path_buf(),
            pid: std::process::id(),
            timestamp: Utc::now(),
        }
    }
}

/// Stable identifier derived from a workspace path.
#[must_use]
pub fn workspace_key(workspace: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(workspace.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..KEY_LEN].to_owned()
}

/// Lock file location for `workspace` inside `dir`.
#[must_use]
pub fn lock_path(dir: &Path, workspace: &Path) -> PathBuf {
    dir.join(format!("{}.json", workspace_key(workspace)))
}

/// Write `lock` atomically into `dir`, creating the directory if needed.
///
/// # Errors
///
/// Returns `AppError::Discovery` if the directory cannot be created or the
/// file cannot be written and renamed into place.
pub fn write(dir: &Path, lock: &LockFile) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|err| {
        AppError::Discovery(format!("failed to create {}: {err}", dir.display()))
    })?;

    let target = lock_path(dir, &lock.workspace);
    let body = serde_json::to_vec_pretty(lock)
        .map_err(|err| AppError::Discovery(format!("failed to serialize lock file: {err}")))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|err| AppError::Discovery(format!("failed to create temporary file: {err}")))?;
    tmp.write_all(&body)
        .map_err(|err| AppError::Discovery(format!("failed to write temporary file: {err}")))?;
    tmp.persist(&target).map_err(|err| {
        AppError::Discovery(format!("failed to persist {}: {err}", target.display()))
    })?;

    debug!(path = %target.display(), port = lock.port, "discovery lock written");
    Ok(target)
}

/// Read the lock file advertised for `workspace`, if any.
///
/// # Errors
///
/// Returns `AppError::Discovery` if the file exists but cannot be read or
/// parsed.
pub fn read(dir: &Path, workspace: &Path) -> Result<Option<LockFile>> {
    let path = lock_path(dir, workspace);
    let raw = match std::fs::read(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(AppError::Discovery(format!(
                "failed to read {}: {err}",
                path.display()
            )))
        }
    };

    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|err| AppError::Discovery(format!("invalid lock file {}: {err}", path.display())))
}

/// Remove a lock file. A file that is already gone is not an error.
///
/// # Errors
///
/// Returns `AppError::Discovery` on any other removal failure.
pub fn remove(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(AppError::Discovery(format!(
            "failed to remove {}: {err}",
            path.display()
        ))),
    }
}
