//! Unit tests for discovery lock files.

use std::path::Path;

use agent_bridge::discovery::{self, LockFile};

#[test]
fn workspace_key_is_stable_and_distinct() {
    let a = discovery::workspace_key(Path::new("/home/me/project"));
    let b = discovery::workspace_key(Path::new("/home/me/project"));
    let c = discovery::workspace_key(Path::new("/home/me/other"));

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 16);
    assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
}

#[test]
fn write_then_read_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let workspace = Path::new("/srv/workspace");
    let lock = LockFile::for_current_process(43210, workspace);

    let path = discovery::write(dir.path(), &lock).expect("writes");
    assert_eq!(path, discovery::lock_path(dir.path(), workspace));

    let read = discovery::read(dir.path(), workspace)
        .expect("reads")
        .expect("present");
    assert_eq!(read, lock);
    assert_eq!(read.pid, std::process::id());
}

#[test]
fn lock_file_fields_use_documented_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    let lock = LockFile::for_current_process(1234, Path::new("/w"));
    let path = discovery::write(dir.path(), &lock).expect("writes");

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(path).expect("read")).expect("json");
    assert_eq!(raw["port"], 1234);
    assert_eq!(raw["workspace"], "/w");
    assert!(raw["pid"].is_u64());
    assert!(raw["timestamp"].is_string());
}

#[test]
fn missing_lock_reads_as_none() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(discovery::read(dir.path(), Path::new("/nowhere"))
        .expect("reads")
        .is_none());
}

#[test]
fn remove_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let lock = LockFile::for_current_process(1, Path::new("/w"));
    let path = discovery::write(dir.path(), &lock).expect("writes");

    discovery::remove(&path).expect("first remove");
    discovery::remove(&path).expect("second remove");
    assert!(!path.exists());
}

#[test]
fn write_creates_missing_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("a").join("b");
    let lock = LockFile::for_current_process(2, Path::new("/w"));

    discovery::write(&nested, &lock).expect("writes");
    assert!(discovery::lock_path(&nested, Path::new("/w")).exists());
}
