//! Sandbox File Tools
//!
//! List, read, and write confined to the workspace root. Every operation
//! resolves its path through the resolver before any side effect.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::patch::{self, PatchReport};
use crate::resolver::resolve;
use crate::SandboxError;

/// One directory entry from [`list`].
#[derive(Debug, Clone, Serialize)]
pub struct DirEntryInfo {
    pub name: String,
    pub relative_path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// Result of [`read`].
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub relative_path: String,
    pub content: String,
}

/// Result of [`write`].
#[derive(Debug, Clone, Serialize)]
pub struct WriteReceipt {
    pub relative_path: String,
    pub bytes_written: usize,
}

/// List one directory level, sorted by name.
pub fn list(real_root: &Path, path: &str) -> Result<Vec<DirEntryInfo>, SandboxError> {
    let resolved = resolve(real_root, path)?;
    if !resolved.absolute.is_dir() {
        return Err(SandboxError::NotFound(format!("not a directory: {path}")));
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(&resolved.absolute)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let meta = entry.metadata()?;
        let relative_path = if resolved.relative.is_empty() {
            name.clone()
        } else {
            format!("{}/{}", resolved.relative, name)
        };
        entries.push(DirEntryInfo {
            name,
            relative_path,
            kind: if meta.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            },
            size: if meta.is_file() { Some(meta.len()) } else { None },
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Read a file as UTF-8.
pub fn read(real_root: &Path, path: &str) -> Result<FileContent, SandboxError> {
    let resolved = resolve(real_root, path)?;
    if !resolved.absolute.is_file() {
        return Err(SandboxError::NotFound(format!("no such file: {path}")));
    }
    let content = fs::read_to_string(&resolved.absolute)?;
    Ok(FileContent {
        relative_path: resolved.relative,
        content,
    })
}

/// Write a file, creating missing ancestor directories. Fails with
/// `Exists` when the target exists and `overwrite` is off.
pub fn write(
    real_root: &Path,
    path: &str,
    content: &str,
    overwrite: bool,
) -> Result<WriteReceipt, SandboxError> {
    let resolved = resolve(real_root, path)?;
    if resolved.absolute.exists() && !overwrite {
        return Err(SandboxError::Exists(format!("file exists: {path}")));
    }
    if let Some(parent) = resolved.absolute.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&resolved.absolute, content)?;
    Ok(WriteReceipt {
        relative_path: resolved.relative,
        bytes_written: content.len(),
    })
}

/// Apply a patch in either dialect. Failures are embedded in the report.
pub fn apply_patch(real_root: &Path, patch_text: &str) -> PatchReport {
    patch::apply_patch(real_root, patch_text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
