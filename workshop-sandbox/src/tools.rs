//! Registry Adapters
//!
//! Exposes the sandbox operations as registered tools. Argument shapes
//! are declared as JSON Schema; parse failures and sandbox errors become
//! structured tool results at the loop boundary.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use workshop_core::registry::{ToolHandler, ToolRegistry};
use workshop_core::types::ToolDefinition;
use workshop_core::WorkshopError;

use crate::fs_tools;

fn required_str(args: &serde_json::Value, field: &str) -> Result<String, WorkshopError> {
    args.get(field)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| WorkshopError::InvalidInput(format!("missing required field: {field}")))
}

/// Register `fs_list`, `fs_read`, `fs_write`, and `fs_apply_patch`
/// against the given workspace root.
pub fn register_fs_tools(registry: &mut ToolRegistry, real_root: &Path) {
    let root = real_root.to_path_buf();
    let handler: ToolHandler = Arc::new(move |args| {
        let root = root.clone();
        Box::pin(async move {
            let path = args
                .get("path")
                .and_then(|v| v.as_str())
                .unwrap_or(".")
                .to_string();
            let entries = fs_tools::list(&root, &path)?;
            Ok(json!({ "entries": entries }))
        })
    });
    registry.register(
        ToolDefinition {
            name: "fs_list".to_string(),
            description: "List one directory level inside the workspace.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Directory relative to the workspace root (default \".\")" }
                }
            }),
        },
        false,
        handler,
    );

    let root = real_root.to_path_buf();
    let handler: ToolHandler = Arc::new(move |args| {
        let root = root.clone();
        Box::pin(async move {
            let path = required_str(&args, "path")?;
            let file = fs_tools::read(&root, &path)?;
            Ok(serde_json::to_value(file).unwrap_or_default())
        })
    });
    registry.register(
        ToolDefinition {
            name: "fs_read".to_string(),
            description: "Read a UTF-8 file inside the workspace.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File relative to the workspace root" }
                },
                "required": ["path"]
            }),
        },
        false,
        handler,
    );

    let root = real_root.to_path_buf();
    let handler: ToolHandler = Arc::new(move |args| {
        let root = root.clone();
        Box::pin(async move {
            let path = required_str(&args, "path")?;
            let content = required_str(&args, "content")?;
            let overwrite = args
                .get("overwrite")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let receipt = fs_tools::write(&root, &path, &content, overwrite)?;
            Ok(serde_json::to_value(receipt).unwrap_or_default())
        })
    });
    registry.register(
        ToolDefinition {
            name: "fs_write".to_string(),
            description: "Write a file inside the workspace, creating parent directories."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "content": { "type": "string" },
                    "overwrite": { "type": "boolean", "description": "Replace an existing file (default false)" }
                },
                "required": ["path", "content"]
            }),
        },
        true,
        handler,
    );

    let root = real_root.to_path_buf();
    let handler: ToolHandler = Arc::new(move |args| {
        let root = root.clone();
        Box::pin(async move {
            let patch = required_str(&args, "patch")?;
            let report = fs_tools::apply_patch(&root, &patch);
            Ok(serde_json::to_value(report).unwrap_or_default())
        })
    });
    registry.register(
        ToolDefinition {
            name: "fs_apply_patch".to_string(),
            description: "Apply a patch (envelope or unified-diff dialect) inside the workspace."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "patch": { "type": "string", "description": "Patch text" }
                },
                "required": ["patch"]
            }),
        },
        true,
        handler,
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ensure_root;

    #[tokio::test]
    async fn registered_tools_resolve_against_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = ensure_root(dir.path()).unwrap();
        let mut registry = ToolRegistry::new();
        register_fs_tools(&mut registry, &root);

        assert_eq!(registry.len(), 4);
        assert!(registry.get("fs_write").unwrap().writable);
        assert!(registry.get("fs_apply_patch").unwrap().writable);
        assert!(!registry.get("fs_read").unwrap().writable);

        let write = registry.get("fs_write").unwrap().handler.clone();
        let result = write(json!({"path": "a.txt", "content": "hi"}))
            .await
            .unwrap();
        assert_eq!(result["bytes_written"], 2);

        let read = registry.get("fs_read").unwrap().handler.clone();
        let result = read(json!({"path": "a.txt"})).await.unwrap();
        assert_eq!(result["content"], "hi");
    }

    #[tokio::test]
    async fn missing_required_field_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let root = ensure_root(dir.path()).unwrap();
        let mut registry = ToolRegistry::new();
        register_fs_tools(&mut registry, &root);

        let read = registry.get("fs_read").unwrap().handler.clone();
        let err = read(json!({})).await.unwrap_err();
        assert!(matches!(err, WorkshopError::InvalidInput(_)));
    }
}
