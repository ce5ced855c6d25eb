//! `previewDiff`: unified diff of a workspace file against proposed contents.
//!
//! Showing the comparison view and collecting accept/reject is the editor's
//! job; this tool only renders the patch text the view would present. A file
//! that does not exist yet diffs against empty contents.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use super::path_guard::resolve_in_workspace;
use super::{required_str, Tool};
use crate::{AppError, Result};

/// Renders proposed edits as a unified diff.
pub struct PreviewDiff {
    root: PathBuf,
}

impl PreviewDiff {
    /// Tool scoped to `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl Tool for PreviewDiff {
    fn name(&self) -> &'static str {
        "previewDiff"
    }

    fn description(&self) -> &'static str {
        "Render a unified diff between a workspace file and proposed new contents"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": { "type": "string", "description": "Path relative to the workspace root" },
                "newContents": { "type": "string", "description": "Proposed file contents" },
            },
            "required": ["filePath", "newContents"],
        })
    }

    fn call(&self, arguments: &Value) -> Result<String> {
        let file_path = required_str(arguments, "filePath")?;
        let new_contents = required_str(arguments, "newContents")?;

        let resolved = resolve_in_workspace(&self.root, file_path)?;
        let current = match std::fs::read_to_string(&resolved) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(AppError::Tool(format!(
                    "failed to read {}: {err}",
                    resolved.display()
                )))
            }
        };

        // CRLF files would otherwise differ on every line.
        let current = current.replace("\r\n", "\n");
        let proposed = new_contents.replace("\r\n", "\n");

        if current == proposed {
            return Ok(format!("No changes to {file_path}"));
        }

        Ok(diffy::create_patch(&current, &proposed).to_string())
    }
}
