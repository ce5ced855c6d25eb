//! Tools exposed through `tools/list` and `tools/call`.
//!
//! Each tool is a [`Tool`] trait object held by a [`ToolRegistry`]. Tools run
//! synchronously on the request connection's task, so they must be quick;
//! anything long-running belongs to the embedding editor.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{json, Value};

use crate::{AppError, Result};

pub mod path_guard;
pub mod preview_diff;
pub mod workspace_folders;

/// A callable tool.
pub trait Tool: Send + Sync {
    /// Name used in `tools/call`.
    fn name(&self) -> &'static str;

    /// One-line description shown to the agent.
    fn description(&self) -> &'static str;

    /// JSON Schema of the `arguments` object.
    fn input_schema(&self) -> Value;

    /// Run the tool and return its text output.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Tool` (or a more specific variant) when the
    /// arguments are invalid or the tool fails.
    fn call(&self, arguments: &Value) -> Result<String>;
}

/// Name-indexed set of tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tools for `workspace`.
    #[must_use]
    pub fn builtin(workspace: &Path) -> Self {
        let mut registry = Self::new();
        registry.register(workspace_folders::WorkspaceFolders::new(workspace));
        registry.register(preview_diff::PreviewDiff::new(workspace));
        registry
    }

    /// Add `tool`, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name(), Box::new(tool));
    }

    /// Tool descriptors for a `tools/list` result, sorted by name.
    #[must_use]
    pub fn descriptors(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "inputSchema": tool.input_schema(),
                })
            })
            .collect()
    }

    /// Whether a tool named `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Invoke the tool named `name`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Tool` if no such tool exists, or the tool's own
    /// error.
    pub fn call(&self, name: &str, arguments: &Value) -> Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| AppError::Tool(format!("unknown tool: {name}")))?;
        tool.call(arguments)
    }
}

/// Fetch a required string argument.
pub(crate) fn required_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Tool(format!("missing required argument '{key}'")))
}
