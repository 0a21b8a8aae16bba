//! # Workshop Sandbox
//!
//! Workspace-confined filesystem tools: path canonicalization with
//! symlink containment, list/read/write, and a two-dialect patch engine.

pub mod fs_tools;
pub mod patch;
pub mod resolver;
pub mod tools;

use thiserror::Error;

pub use fs_tools::{DirEntryInfo, EntryKind, FileContent, WriteReceipt};
pub use patch::{apply_patch, PatchOperation, PatchReport};
pub use resolver::{ensure_root, resolve, Resolved};
pub use tools::register_fs_tools;

/// Errors raised by sandbox operations.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Empty, absolute, drive-qualified, or UNC input.
    #[error("invalid path: {0}")]
    Invalid(String),

    /// Canonicalized path lands outside the workspace root.
    #[error("path escapes the workspace: {0}")]
    Escape(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Exists(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SandboxError> for workshop_core::WorkshopError {
    fn from(err: SandboxError) -> Self {
        use workshop_core::WorkshopError;
        match err {
            SandboxError::Invalid(msg) => WorkshopError::InvalidInput(msg),
            SandboxError::Escape(msg) => WorkshopError::Escape(msg),
            SandboxError::NotFound(msg) => WorkshopError::NotFound(msg),
            SandboxError::Exists(msg) => WorkshopError::Exists(msg),
            SandboxError::Io(e) => WorkshopError::Io(e),
        }
    }
}
