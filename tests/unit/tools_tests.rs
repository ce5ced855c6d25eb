//! Unit tests for the tool registry and built-in tools.

use agent_bridge::tools::path_guard::resolve_in_workspace;
use agent_bridge::tools::{Tool, ToolRegistry};
use agent_bridge::{AppError, Result};
use serde_json::{json, Value};

struct Upper;

impl Tool for Upper {
    fn name(&self) -> &'static str {
        "upper"
    }

    fn description(&self) -> &'static str {
        "Upper-case the input"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    fn call(&self, arguments: &Value) -> Result<String> {
        Ok(arguments["text"].as_str().unwrap_or_default().to_uppercase())
    }
}

#[test]
fn registry_lists_and_calls_custom_tool() {
    let mut registry = ToolRegistry::new();
    registry.register(Upper);

    let descriptors = registry.descriptors();
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0]["name"], "upper");
    assert_eq!(descriptors[0]["inputSchema"]["type"], "object");

    let out = registry
        .call("upper", &json!({ "text": "abc" }))
        .expect("call");
    assert_eq!(out, "ABC");
}

#[test]
fn unknown_tool_is_an_error() {
    let registry = ToolRegistry::new();
    let err = registry.call("missing", &json!({})).expect_err("must fail");
    assert!(matches!(err, AppError::Tool(_)));
}

#[test]
fn workspace_folders_reports_root() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().canonicalize().expect("canonical");
    let registry = ToolRegistry::builtin(&root);

    let out = registry
        .call("getWorkspaceFolders", &json!({}))
        .expect("call");
    let value: Value = serde_json::from_str(&out).expect("json");

    assert_eq!(value["rootPath"], &*root.to_string_lossy());
    assert_eq!(value["folders"].as_array().map(Vec::len), Some(1));
}

#[test]
fn preview_diff_renders_unified_patch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().canonicalize().expect("canonical");
    std::fs::write(root.join("a.txt"), "one\ntwo\n").expect("seed");
    let registry = ToolRegistry::builtin(&root);

    let out = registry
        .call(
            "previewDiff",
            &json!({ "filePath": "a.txt", "newContents": "one\nthree\n" }),
        )
        .expect("call");

    assert!(out.contains("-two"));
    assert!(out.contains("+three"));
}

#[test]
fn preview_diff_of_new_file_adds_every_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().canonicalize().expect("canonical");
    let registry = ToolRegistry::builtin(&root);

    let out = registry
        .call(
            "previewDiff",
            &json!({ "filePath": "new.txt", "newContents": "hello\n" }),
        )
        .expect("call");

    assert!(out.contains("+hello"));
}

#[test]
fn preview_diff_reports_unchanged_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().canonicalize().expect("canonical");
    std::fs::write(root.join("same.txt"), "x\r\n").expect("seed");
    let registry = ToolRegistry::builtin(&root);

    let out = registry
        .call(
            "previewDiff",
            &json!({ "filePath": "same.txt", "newContents": "x\n" }),
        )
        .expect("call");

    assert_eq!(out, "No changes to same.txt");
}

#[test]
fn preview_diff_requires_arguments() {
    let dir = tempfile::tempdir().expect("tempdir");
    let registry = ToolRegistry::builtin(dir.path());

    let err = registry
        .call("previewDiff", &json!({ "filePath": "a.txt" }))
        .expect_err("must fail");
    assert!(err.to_string().contains("newContents"));
}

#[test]
fn path_guard_rejects_escape() {
    let dir = tempfile::tempdir().expect("tempdir");

    assert!(resolve_in_workspace(dir.path(), "../etc/passwd").is_err());
    assert!(resolve_in_workspace(dir.path(), "/etc/passwd").is_err());
}

#[test]
fn path_guard_accepts_nested_relative_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().canonicalize().expect("canonical");

    let resolved = resolve_in_workspace(&root, "src/./lib/../main.rs").expect("inside");
    assert_eq!(resolved, root.join("src").join("main.rs"));
}
