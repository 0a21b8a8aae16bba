//! Session Logger
//!
//! Append-only JSONL event log per session, written under
//! `<base>/.workshop/sessions/`. Fire-and-forget: write failures are
//! swallowed and surfaced only through `tracing::debug`.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;

use crate::types::{Role, ToolCall};

/// One session's structured event log.
pub struct SessionLogger {
    path: PathBuf,
    file: Mutex<File>,
}

impl SessionLogger {
    /// Open a fresh log file for a new session. Returns `None` when the
    /// log directory or file cannot be created.
    pub fn create(base_dir: &Path) -> Option<Self> {
        let dir = base_dir.join(".workshop").join("sessions");
        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::debug!(err = %e, "failed to create session log dir");
            return None;
        }
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ");
        let path = dir.join(format!("{stamp}.jsonl"));
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(Self {
                path,
                file: Mutex::new(file),
            }),
            Err(e) => {
                tracing::debug!(err = %e, "failed to open session log");
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn message(&self, role: Role, content: Option<&str>, tool_calls: &[ToolCall]) {
        let mut entry = json!({
            "type": "message",
            "role": role,
            "content": content,
        });
        if !tool_calls.is_empty() {
            entry["tool_calls"] = serde_json::to_value(tool_calls).unwrap_or_default();
        }
        self.append(entry);
    }

    /// `arguments` may be the raw string (when parsing failed) or the
    /// parsed object.
    pub fn tool_call(&self, name: &str, arguments: &serde_json::Value) {
        self.append(json!({
            "type": "tool_call",
            "name": name,
            "arguments": arguments,
        }));
    }

    pub fn tool_result(&self, name: &str, result: &serde_json::Value) {
        self.append(json!({
            "type": "tool_result",
            "name": name,
            "result": result,
        }));
    }

    pub fn agent(&self, id: &str, name: &str, reason: &str, content: &str) {
        self.append(json!({
            "type": "agent",
            "id": id,
            "name": name,
            "reason": reason,
            "content": content,
        }));
    }

    fn append(&self, mut entry: serde_json::Value) {
        entry["ts"] = json!(Utc::now().to_rfc3339());
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(err = %e, "failed to serialize log entry");
                return;
            }
        };
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(file, "{line}") {
            tracing::debug!(err = %e, "failed to append session log entry");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_json_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SessionLogger::create(dir.path()).unwrap();

        logger.message(Role::User, Some("hello"), &[]);
        logger.tool_call("fs_read", &json!({"path": "a.txt"}));
        logger.tool_result("fs_read", &json!({"content": "hi"}));
        logger.agent("research", "Research Agent", "matched \"research\"", "brief");

        let content = fs::read_to_string(logger.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "message");
        assert_eq!(first["role"], "user");
        assert!(first["ts"].is_string());

        let last: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(last["type"], "agent");
        assert_eq!(last["name"], "Research Agent");
    }

    #[test]
    fn log_file_lands_under_workshop_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SessionLogger::create(dir.path()).unwrap();
        let path = logger.path().to_string_lossy().into_owned();
        assert!(path.contains(".workshop"));
        assert!(path.ends_with(".jsonl"));
    }
}
