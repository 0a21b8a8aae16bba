//! Tool Registry
//!
//! Name-keyed registry of `(definition, handler)` pairs. Argument parsing
//! happens at the registry boundary in the agent loop; handler failures
//! become structured tool results rather than aborting the turn.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::WorkshopError;
use crate::types::ToolDefinition;

/// Executes a tool call with parsed JSON arguments.
pub type ToolHandler = Arc<
    dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, WorkshopError>>
        + Send
        + Sync,
>;

/// A registered tool: its advertised definition plus the handler.
#[derive(Clone)]
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    /// Writable tools are gated by the confirm collaborator when
    /// auto-approve is off.
    pub writable: bool,
    pub handler: ToolHandler,
}

/// Registry of all tools advertised to the model for a session.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Re-registering a name replaces the earlier entry.
    pub fn register(&mut self, definition: ToolDefinition, writable: bool, handler: ToolHandler) {
        let name = definition.name.clone();
        tracing::debug!(tool = %name, writable, "registered tool");
        if self.tools.contains_key(&name) {
            self.order.retain(|n| n != &name);
        }
        self.order.push(name.clone());
        self.tools.insert(
            name,
            RegisteredTool {
                definition,
                writable,
                handler,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Definitions in registration order, for the provider request.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
