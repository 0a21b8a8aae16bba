//! End-to-end sandbox scenarios: resolution, containment, and patch
//! application against a real temporary workspace.

use workshop_sandbox::{apply_patch, ensure_root, fs_tools, resolve, SandboxError};

use std::fs;
use std::path::PathBuf;

use tempfile::tempdir;

fn workspace() -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().expect("tempdir");
    let root = ensure_root(dir.path()).expect("ensure root");
    (dir, root)
}

#[test]
fn safe_relative_write_path() {
    let (_dir, root) = workspace();
    let resolved = resolve(&root, "notes/plan.txt").expect("resolve");
    assert!(resolved.absolute.starts_with(&root));
    assert_eq!(resolved.relative, "notes/plan.txt");
}

#[test]
fn escape_rejection() {
    let (_dir, root) = workspace();

    let err = resolve(&root, "../secrets.txt").expect_err("traversal must fail");
    assert!(matches!(err, SandboxError::Escape(_)));

    let outside = tempdir().expect("tempdir");
    let abs = outside.path().join("secrets.txt");
    let err = resolve(&root, abs.to_str().unwrap()).expect_err("absolute must fail");
    assert!(matches!(err, SandboxError::Invalid(_)));
}

#[cfg(unix)]
#[test]
fn symlink_escape_rejection() {
    let (_dir, root) = workspace();
    let outside = tempdir().expect("tempdir");
    std::os::unix::fs::symlink(outside.path(), root.join("link")).expect("symlink");

    let err = resolve(&root, "link/evil.txt").expect_err("symlink target must fail");
    assert!(matches!(err, SandboxError::Escape(_)));
}

#[test]
fn envelope_patch_scenario() {
    let (_dir, root) = workspace();
    fs::write(root.join("a.txt"), "hello").expect("seed");

    let patch = "*** Begin Patch\n\
*** Update File: a.txt\n\
hello world\n\
*** Add File: b.txt\n\
new file\n\
*** Delete File: a.txt\n\
*** End Patch";

    let report = apply_patch(&root, patch);
    assert!(report.applied, "summary: {}", report.summary);
    assert!(!root.join("a.txt").exists());
    assert_eq!(fs::read_to_string(root.join("b.txt")).unwrap(), "new file");
}

#[test]
fn unified_diff_scenario() {
    let (_dir, root) = workspace();
    fs::write(root.join("c.txt"), "one\nTwo\n").expect("seed");

    let patch = "--- a/c.txt\n+++ b/c.txt\n@@ -1,2 +1,2 @@\n one\n-Two\n+Three\n";
    let report = apply_patch(&root, patch);
    assert!(report.applied, "summary: {}", report.summary);
    assert_eq!(
        fs::read_to_string(root.join("c.txt")).unwrap(),
        "one\nThree\n"
    );
}

#[test]
fn overwrite_semantics() {
    let (_dir, root) = workspace();
    fs_tools::write(&root, "f.txt", "first", false).expect("initial write");

    let err = fs_tools::write(&root, "f.txt", "second", false).expect_err("must fail");
    assert!(matches!(err, SandboxError::Exists(_)));
    assert_eq!(fs::read_to_string(root.join("f.txt")).unwrap(), "first");

    fs_tools::write(&root, "f.txt", "second", true).expect("overwrite");
    assert_eq!(fs::read_to_string(root.join("f.txt")).unwrap(), "second");
}

#[test]
fn add_then_delete_round_trips() {
    let (_dir, root) = workspace();
    let before: Vec<String> = fs_tools::list(&root, ".")
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();

    let add = "*** Begin Patch\n*** Add File: temp.txt\ntransient\n*** End Patch";
    assert!(apply_patch(&root, add).applied);
    assert!(root.join("temp.txt").exists());

    let delete = "*** Begin Patch\n*** Delete File: temp.txt\n*** End Patch";
    assert!(apply_patch(&root, delete).applied);

    let after: Vec<String> = fs_tools::list(&root, ".")
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(before, after);
}

#[test]
fn patch_failure_reports_partial_changes() {
    let (_dir, root) = workspace();

    let patch = "*** Begin Patch\n\
*** Add File: kept.txt\n\
content\n\
*** Delete File: never-existed.txt\n\
*** End Patch";

    let report = apply_patch(&root, patch);
    assert!(!report.applied);
    assert_eq!(report.changed_files, vec!["kept.txt"]);
    assert!(root.join("kept.txt").exists());
}
