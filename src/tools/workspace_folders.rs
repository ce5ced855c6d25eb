//! `getWorkspaceFolders`: report the workspace served by this bridge.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use super::Tool;
use crate::{AppError, Result};

/// Lists the single workspace folder the editor has open.
pub struct WorkspaceFolders {
    root: PathBuf,
}

impl WorkspaceFolders {
    /// Tool reporting `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// JSON description of the workspace, shared with the initial snapshot.
    #[must_use]
    pub fn snapshot(root: &Path) -> Value {
        let path = root.to_string_lossy();
        let name = root
            .file_name()
            .map_or_else(|| path.clone(), |name| name.to_string_lossy());
        json!({
            "rootPath": path,
            "folders": [{
                "name": name,
                "path": path,
                "uri": format!("file://{path}"),
            }],
        })
    }
}

impl Tool for WorkspaceFolders {
    fn name(&self) -> &'static str {
        "getWorkspaceFolders"
    }

    fn description(&self) -> &'static str {
        "List the workspace folders open in the editor"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn call(&self, _arguments: &Value) -> Result<String> {
        serde_json::to_string(&Self::snapshot(&self.root))
            .map_err(|err| AppError::Tool(format!("failed to serialize folders: {err}")))
    }
}
