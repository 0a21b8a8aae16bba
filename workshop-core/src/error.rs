//! Error Kinds
//!
//! Structured errors surfaced by the core. Tool-level failures are
//! captured and embedded in tool-result messages so the model can react;
//! provider errors propagate out of the turn.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkshopError {
    /// Bad path, bad patch line, or a missing required field.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Path resolves outside the workspace root.
    #[error("path escapes the workspace: {0}")]
    Escape(String),

    /// Missing file for update/delete, or an unknown session.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write target exists and overwrite was not requested.
    #[error("already exists: {0}")]
    Exists(String),

    /// Non-success response from the chat provider.
    #[error("provider error: {message}")]
    Provider {
        status: Option<u16>,
        message: String,
    },

    /// Tool-call arguments were not valid JSON.
    #[error("Invalid tool arguments for {name}")]
    ToolArgumentsInvalid { name: String },

    /// A tool handler failed.
    #[error("tool execution failed: {0}")]
    ToolExecutionFailed(String),

    /// Bearer token mismatch.
    #[error("unauthorized")]
    Unauthorized,

    /// The session is already processing a turn.
    #[error("session is busy")]
    Busy,

    /// The in-flight operation was cancelled.
    #[error("cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkshopError {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            status: None,
            message: message.into(),
        }
    }

    pub fn provider_status(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status: Some(status),
            message: message.into(),
        }
    }
}
