//! Patch Engine
//!
//! Applies two patch dialects inside the sandbox: an envelope format
//! (`*** Begin Patch` / `*** Add File:` / ...) and standard unified
//! diffs. The dialect is decided by content sniffing before any file is
//! touched. Multi-file patches apply sequentially; a mid-batch failure
//! reports the files changed so far and does not roll back.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::resolver::resolve;

/// Result of a patch application.
#[derive(Debug, Clone, Serialize)]
pub struct PatchReport {
    pub applied: bool,
    pub summary: String,
    pub changed_files: Vec<String>,
}

impl PatchReport {
    fn failure(summary: impl Into<String>, changed_files: Vec<String>) -> Self {
        Self {
            applied: false,
            summary: summary.into(),
            changed_files,
        }
    }
}

/// A single operation parsed from a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOperation {
    Add { path: String, content: String },
    Update { path: String, content: String },
    Delete { path: String },
}

/// Apply a patch in either dialect. Every path routes through the
/// resolver; failures are embedded in the report.
pub fn apply_patch(real_root: &Path, patch_text: &str) -> PatchReport {
    if patch_text.contains("*** Begin Patch") {
        return apply_envelope(real_root, patch_text);
    }
    if looks_like_unified_diff(patch_text) {
        return apply_unified(real_root, patch_text);
    }
    PatchReport::failure("Unrecognized patch format", Vec::new())
}

fn looks_like_unified_diff(text: &str) -> bool {
    text.lines().any(|line| {
        line.starts_with("diff --git") || line.starts_with("--- ") || line.starts_with("+++ ")
    })
}

// ---------------------------------------------------------------------------
// Envelope dialect
// ---------------------------------------------------------------------------

/// Parse the envelope dialect into operations. Fails on any `*** ` line
/// that is not a known directive.
pub fn parse_envelope(patch_text: &str) -> Result<Vec<PatchOperation>, String> {
    let mut ops = Vec::new();
    let mut in_patch = false;
    // (directive, path, content lines) for the op being accumulated
    let mut current: Option<(Directive, String, Vec<String>)> = None;

    for line in patch_text.lines() {
        if !in_patch {
            if line.trim() == "*** Begin Patch" {
                in_patch = true;
            }
            continue;
        }
        if line == "*** End Patch" {
            flush(&mut current, &mut ops);
            in_patch = false;
            continue;
        }
        if let Some(path) = line.strip_prefix("*** Add File: ") {
            flush(&mut current, &mut ops);
            current = Some((Directive::Add, path.trim().to_string(), Vec::new()));
        } else if let Some(path) = line.strip_prefix("*** Update File: ") {
            flush(&mut current, &mut ops);
            current = Some((Directive::Update, path.trim().to_string(), Vec::new()));
        } else if let Some(path) = line.strip_prefix("*** Delete File: ") {
            flush(&mut current, &mut ops);
            ops.push(PatchOperation::Delete {
                path: path.trim().to_string(),
            });
        } else if line.starts_with("*** ") {
            return Err(format!("Unrecognized line: {line}"));
        } else if let Some((_, _, content)) = current.as_mut() {
            content.push(line.to_string());
        } else {
            return Err(format!("Unrecognized line: {line}"));
        }
    }
    Ok(ops)
}

#[derive(Debug, Clone, Copy)]
enum Directive {
    Add,
    Update,
}

fn flush(current: &mut Option<(Directive, String, Vec<String>)>, ops: &mut Vec<PatchOperation>) {
    if let Some((directive, path, content)) = current.take() {
        let content = content.join("\n");
        ops.push(match directive {
            Directive::Add => PatchOperation::Add { path, content },
            Directive::Update => PatchOperation::Update { path, content },
        });
    }
}

fn apply_envelope(real_root: &Path, patch_text: &str) -> PatchReport {
    let ops = match parse_envelope(patch_text) {
        Ok(ops) => ops,
        Err(message) => return PatchReport::failure(message, Vec::new()),
    };
    if ops.is_empty() {
        return PatchReport::failure("Patch contains no operations", Vec::new());
    }

    let mut changed = Vec::new();
    for op in &ops {
        if let Err(message) = apply_operation(real_root, op, &mut changed) {
            return PatchReport::failure(message, changed);
        }
    }
    PatchReport {
        applied: true,
        summary: format!("Applied {} operation(s)", ops.len()),
        changed_files: changed,
    }
}

fn apply_operation(
    real_root: &Path,
    op: &PatchOperation,
    changed: &mut Vec<String>,
) -> Result<(), String> {
    match op {
        PatchOperation::Add { path, content } => {
            let resolved = resolve(real_root, path).map_err(|e| e.to_string())?;
            if resolved.absolute.exists() {
                return Err(format!("File already exists: {path}"));
            }
            write_with_parents(&resolved.absolute, content).map_err(|e| e.to_string())?;
            debug!(path = %resolved.relative, "patch added file");
            changed.push(resolved.relative);
        }
        PatchOperation::Update { path, content } => {
            let resolved = resolve(real_root, path).map_err(|e| e.to_string())?;
            if !resolved.absolute.exists() {
                return Err(format!("File not found: {path}"));
            }
            fs::write(&resolved.absolute, content).map_err(|e| e.to_string())?;
            debug!(path = %resolved.relative, "patch updated file");
            changed.push(resolved.relative);
        }
        PatchOperation::Delete { path } => {
            let resolved = resolve(real_root, path).map_err(|e| e.to_string())?;
            if !resolved.absolute.exists() {
                return Err(format!("File not found: {path}"));
            }
            fs::remove_file(&resolved.absolute).map_err(|e| e.to_string())?;
            debug!(path = %resolved.relative, "patch deleted file");
            changed.push(resolved.relative);
        }
    }
    Ok(())
}

fn write_with_parents(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

// ---------------------------------------------------------------------------
// Unified-diff dialect
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct FilePatch {
    old_path: Option<String>,
    new_path: Option<String>,
    hunks: Vec<Hunk>,
}

#[derive(Debug, Clone)]
struct Hunk {
    old_start: usize,
    lines: Vec<HunkLine>,
}

#[derive(Debug, Clone)]
enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

fn parse_unified(patch_text: &str) -> Result<Vec<FilePatch>, String> {
    fn close_hunk(current: &mut Option<FilePatch>, hunk: &mut Option<Hunk>) {
        if let (Some(patch), Some(done)) = (current.as_mut(), hunk.take()) {
            patch.hunks.push(done);
        }
    }

    let mut patches: Vec<FilePatch> = Vec::new();
    let mut current: Option<FilePatch> = None;
    let mut hunk: Option<Hunk> = None;

    for line in patch_text.lines() {
        if line.starts_with("diff --git") {
            close_hunk(&mut current, &mut hunk);
            if let Some(done) = current.take() {
                patches.push(done);
            }
            current = Some(FilePatch::default());
        } else if let Some(rest) = line.strip_prefix("--- ") {
            close_hunk(&mut current, &mut hunk);
            // A fresh `---` after hunks starts the next file patch.
            if current.as_ref().map_or(true, |p| !p.hunks.is_empty()) {
                if let Some(done) = current.take() {
                    patches.push(done);
                }
                current = Some(FilePatch::default());
            }
            if let Some(patch) = current.as_mut() {
                patch.old_path = parse_diff_path(rest);
            }
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            let patch = current.get_or_insert_with(FilePatch::default);
            patch.new_path = parse_diff_path(rest);
        } else if line.starts_with("@@") {
            close_hunk(&mut current, &mut hunk);
            let old_start = parse_hunk_header(line)
                .ok_or_else(|| format!("Malformed hunk header: {line}"))?;
            if current.is_none() {
                return Err("Hunk without a file header".to_string());
            }
            hunk = Some(Hunk {
                old_start,
                lines: Vec::new(),
            });
        } else if let Some(active) = hunk.as_mut() {
            if let Some(text) = line.strip_prefix('+') {
                active.lines.push(HunkLine::Add(text.to_string()));
            } else if let Some(text) = line.strip_prefix('-') {
                active.lines.push(HunkLine::Remove(text.to_string()));
            } else if let Some(text) = line.strip_prefix(' ') {
                active.lines.push(HunkLine::Context(text.to_string()));
            } else if line.is_empty() {
                active.lines.push(HunkLine::Context(String::new()));
            }
            // `\ No newline at end of file` markers are dropped.
        }
        // Index/mode lines outside hunks are ignored.
    }
    close_hunk(&mut current, &mut hunk);
    if let Some(done) = current.take() {
        patches.push(done);
    }

    patches.retain(|p| p.old_path.is_some() || p.new_path.is_some());
    if patches.is_empty() {
        return Err("Patch contains no file headers".to_string());
    }
    Ok(patches)
}

/// Extract the path from a `---`/`+++` header, stripping `a/`/`b/`.
fn parse_diff_path(rest: &str) -> Option<String> {
    let raw = rest.split_whitespace().next()?;
    if raw == "/dev/null" {
        return Some(raw.to_string());
    }
    let stripped = raw
        .strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(raw);
    Some(stripped.to_string())
}

/// Parse `@@ -l[,c] +l[,c] @@` and return the old-side start line.
fn parse_hunk_header(line: &str) -> Option<usize> {
    let rest = line.strip_prefix("@@")?.trim_start();
    let old = rest.split_whitespace().next()?.strip_prefix('-')?;
    let start = old.split(',').next()?;
    start.parse().ok()
}

fn apply_unified(real_root: &Path, patch_text: &str) -> PatchReport {
    let patches = match parse_unified(patch_text) {
        Ok(patches) => patches,
        Err(message) => return PatchReport::failure(message, Vec::new()),
    };

    let mut changed = Vec::new();
    for patch in &patches {
        if let Err(message) = apply_file_patch(real_root, patch, &mut changed) {
            return PatchReport::failure(message, changed);
        }
    }
    PatchReport {
        applied: true,
        summary: format!("Applied diff to {} file(s)", changed.len()),
        changed_files: changed,
    }
}

fn apply_file_patch(
    real_root: &Path,
    patch: &FilePatch,
    changed: &mut Vec<String>,
) -> Result<(), String> {
    // `+++ /dev/null` deletes the `---` side.
    if patch.new_path.as_deref() == Some("/dev/null") {
        let old = patch
            .old_path
            .as_deref()
            .ok_or("Deletion without an old path")?;
        let resolved = resolve(real_root, old).map_err(|e| e.to_string())?;
        if !resolved.absolute.exists() {
            return Err(format!("File not found: {old}"));
        }
        fs::remove_file(&resolved.absolute).map_err(|e| e.to_string())?;
        changed.push(resolved.relative);
        return Ok(());
    }

    let target = patch
        .new_path
        .as_deref()
        .filter(|p| *p != "/dev/null")
        .or(patch.old_path.as_deref())
        .ok_or("Patch without a target path")?;
    let resolved = resolve(real_root, target).map_err(|e| e.to_string())?;

    let existing = if resolved.absolute.exists() {
        fs::read_to_string(&resolved.absolute)
            .map_err(|e| format!("Failed to read {target}: {e}"))?
    } else {
        String::new()
    };

    let updated = apply_hunks(&existing, &patch.hunks)
        .map_err(|e| format!("Failed to apply hunks to {target}: {e}"))?;

    write_with_parents(&resolved.absolute, &updated).map_err(|e| e.to_string())?;
    debug!(path = %resolved.relative, "diff applied");
    changed.push(resolved.relative);
    Ok(())
}

/// Apply hunks with standard positional semantics; context and removal
/// lines must match the source exactly.
fn apply_hunks(content: &str, hunks: &[Hunk]) -> Result<String, String> {
    let had_trailing_newline = content.ends_with('\n');
    let src: Vec<&str> = if content.is_empty() {
        Vec::new()
    } else {
        content.lines().collect()
    };

    let mut out: Vec<String> = Vec::new();
    let mut pos = 0usize;

    for hunk in hunks {
        let start = hunk.old_start.saturating_sub(1);
        if start < pos || start > src.len() {
            return Err(format!("hunk start {} out of range", hunk.old_start));
        }
        out.extend(src[pos..start].iter().map(|s| s.to_string()));
        pos = start;

        for line in &hunk.lines {
            match line {
                HunkLine::Context(text) => {
                    if pos >= src.len() || src[pos] != text {
                        return Err(format!("context mismatch at line {}", pos + 1));
                    }
                    out.push(text.clone());
                    pos += 1;
                }
                HunkLine::Remove(text) => {
                    if pos >= src.len() || src[pos] != text {
                        return Err(format!("removed line mismatch at line {}", pos + 1));
                    }
                    pos += 1;
                }
                HunkLine::Add(text) => {
                    out.push(text.clone());
                }
            }
        }
    }

    out.extend(src[pos..].iter().map(|s| s.to_string()));

    let mut result = out.join("\n");
    if !out.is_empty() && (had_trailing_newline || content.is_empty()) {
        result.push('\n');
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ensure_root;
    use std::path::PathBuf;

    fn root() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = ensure_root(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn envelope_update_add_delete() {
        let (_dir, root) = root();
        fs::write(root.join("a.txt"), "hello").unwrap();

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
        assert_eq!(report.changed_files, vec!["a.txt", "b.txt", "a.txt"]);
    }

    #[test]
    fn envelope_add_fails_on_existing_target() {
        let (_dir, root) = root();
        fs::write(root.join("a.txt"), "x").unwrap();

        let patch = "*** Begin Patch\n*** Add File: a.txt\ny\n*** End Patch";
        let report = apply_patch(&root, patch);
        assert!(!report.applied);
        assert!(report.summary.contains("already exists"));
        assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "x");
    }

    #[test]
    fn envelope_update_fails_on_missing_target() {
        let (_dir, root) = root();
        let patch = "*** Begin Patch\n*** Update File: missing.txt\nx\n*** End Patch";
        let report = apply_patch(&root, patch);
        assert!(!report.applied);
        assert!(report.summary.contains("not found"));
    }

    #[test]
    fn envelope_unknown_directive_fails_before_changes() {
        let (_dir, root) = root();
        let patch = "*** Begin Patch\n\
*** Add File: a.txt\n\
content\n\
*** Rename File: a.txt\n\
*** End Patch";
        let report = apply_patch(&root, patch);
        assert!(!report.applied);
        assert!(report.summary.contains("Unrecognized line"));
        assert!(!root.join("a.txt").exists());
        assert!(report.changed_files.is_empty());
    }

    #[test]
    fn envelope_partial_failure_keeps_earlier_changes() {
        let (_dir, root) = root();
        let patch = "*** Begin Patch\n\
*** Add File: created.txt\n\
hello\n\
*** Update File: missing.txt\n\
nope\n\
*** End Patch";
        let report = apply_patch(&root, patch);
        assert!(!report.applied);
        assert_eq!(report.changed_files, vec!["created.txt"]);
        assert_eq!(
            fs::read_to_string(root.join("created.txt")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn envelope_routes_paths_through_resolver() {
        let (_dir, root) = root();
        let patch = "*** Begin Patch\n*** Add File: ../evil.txt\nx\n*** End Patch";
        let report = apply_patch(&root, patch);
        assert!(!report.applied);
        assert!(report.summary.contains("escapes"));
    }

    #[test]
    fn unified_diff_replaces_line() {
        let (_dir, root) = root();
        fs::write(root.join("c.txt"), "one\nTwo\n").unwrap();

        let patch = "--- a/c.txt\n+++ b/c.txt\n@@ -1,2 +1,2 @@\n one\n-Two\n+Three\n";

        let report = apply_patch(&root, patch);
        assert!(report.applied, "summary: {}", report.summary);
        assert_eq!(
            fs::read_to_string(root.join("c.txt")).unwrap(),
            "one\nThree\n"
        );
    }

    #[test]
    fn unified_diff_dev_null_deletes() {
        let (_dir, root) = root();
        fs::write(root.join("gone.txt"), "bye\n").unwrap();

        let patch = "--- a/gone.txt\n+++ /dev/null\n@@ -1 +0,0 @@\n-bye\n";
        let report = apply_patch(&root, patch);
        assert!(report.applied, "summary: {}", report.summary);
        assert!(!root.join("gone.txt").exists());
    }

    #[test]
    fn unified_diff_creates_missing_file() {
        let (_dir, root) = root();
        let patch = "--- /dev/null\n+++ b/fresh.txt\n@@ -0,0 +1,2 @@\n+alpha\n+beta\n";
        let report = apply_patch(&root, patch);
        assert!(report.applied, "summary: {}", report.summary);
        assert_eq!(
            fs::read_to_string(root.join("fresh.txt")).unwrap(),
            "alpha\nbeta\n"
        );
    }

    #[test]
    fn unified_diff_context_mismatch_fails() {
        let (_dir, root) = root();
        fs::write(root.join("c.txt"), "a\nb\n").unwrap();

        let patch = "--- a/c.txt\n+++ b/c.txt\n@@ -1,1 +1,1 @@\n-missing\n+present\n";
        let report = apply_patch(&root, patch);
        assert!(!report.applied);
        assert!(report.summary.contains("mismatch"));
        assert_eq!(fs::read_to_string(root.join("c.txt")).unwrap(), "a\nb\n");
    }

    #[test]
    fn unrecognized_format_is_reported() {
        let (_dir, root) = root();
        let report = apply_patch(&root, "this is not a patch");
        assert!(!report.applied);
        assert_eq!(report.summary, "Unrecognized patch format");
    }

    #[test]
    fn parse_envelope_yields_operations_in_order() {
        let ops = parse_envelope(
            "*** Begin Patch\n*** Add File: x\nbody\n*** Delete File: y\n*** End Patch",
        )
        .unwrap();
        assert_eq!(
            ops,
            vec![
                PatchOperation::Add {
                    path: "x".to_string(),
                    content: "body".to_string()
                },
                PatchOperation::Delete {
                    path: "y".to_string()
                },
            ]
        );
    }
}
