//! Streaming Tool-Call Assembly
//!
//! Merges per-chunk tool-call deltas into complete tool calls. Slot
//! selection: an explicit `index` wins, then a matching `id`, then append.
//! Argument chunks are concatenated in arrival order.

use chrono::Utc;

use crate::types::{ToolCall, ToolCallDelta};

/// Accumulates [`ToolCallDelta`]s into an ordered slot array.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    slots: Vec<ToolCall>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one delta into the slot array.
    pub fn apply(&mut self, delta: &ToolCallDelta) {
        let index = self.slot_index(delta);
        while self.slots.len() <= index {
            let next = self.slots.len();
            self.slots.push(empty_slot(next));
        }

        let slot = &mut self.slots[index];
        if let Some(id) = &delta.id {
            slot.id = id.clone();
        }
        if let Some(name) = &delta.name {
            slot.function.name = name.clone();
        }
        if let Some(chunk) = &delta.arguments {
            slot.function.arguments.push_str(chunk);
        }
    }

    /// Whether any slot has been started.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Finish assembly and return the completed calls.
    pub fn finish(self) -> Vec<ToolCall> {
        self.slots
    }

    fn slot_index(&self, delta: &ToolCallDelta) -> usize {
        if let Some(index) = delta.index {
            return index;
        }
        if let Some(id) = &delta.id {
            if let Some(pos) = self.slots.iter().position(|slot| &slot.id == id) {
                return pos;
            }
        }
        self.slots.len()
    }
}

/// A fresh slot with a synthesized stable id, filled in by later deltas.
fn empty_slot(index: usize) -> ToolCall {
    ToolCall::function(
        format!("call_{}_{}", Utc::now().timestamp_millis(), index),
        "",
        "",
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
