//! # Workshop Core
//!
//! Core library for the workshop assistant runtime: conversation and tool
//! types, the chat-provider trait, the tool registry, streaming tool-call
//! assembly, the specialist-agent router, the session logger, and the
//! bounded agent loop.

pub mod agent_loop;
pub mod config;
pub mod error;
pub mod logger;
pub mod provider;
pub mod registry;
pub mod router;
pub mod session;
pub mod specialist;
pub mod stream;
pub mod types;

// Re-export key types
pub use agent_loop::{AgentEvent, AgentLoop, AgentLoopConfig, ConfirmFn, EventSink, TurnReport};
pub use config::{Settings, SettingsOverlay};
pub use error::WorkshopError;
pub use logger::SessionLogger;
pub use provider::{ChatChunk, ChatOutcome, ChatProvider, ChatRequest, ChatStream, ToolChoice};
pub use registry::{RegisteredTool, ToolHandler, ToolRegistry};
pub use router::{route, AgentProfile, RouteDecision};
pub use session::{Session, DEFAULT_SYSTEM_PROMPT};
pub use stream::ToolCallAssembler;
pub use types::{
    estimate_tokens, Conversation, FunctionCall, Message, Role, ToolCall, ToolCallDelta,
    ToolDefinition,
};
