//! Chat Provider Interface
//!
//! Defines the `ChatProvider` trait and its request/response types. The
//! concrete OpenAI-compatible adapter lives in `workshop-provider-openai`;
//! tests use in-process mocks.

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::error::WorkshopError;
use crate::types::{Message, ToolCall, ToolCallDelta, ToolDefinition};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Whether the model may emit tool calls for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    Auto,
    None,
}

impl ToolChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
        }
    }
}

/// A single chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            temperature: 0.0,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// The distilled `choices[0].message` of a unary completion.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatOutcome {
    /// Whether the completion carries anything the loop can act on.
    pub fn is_usable(&self) -> bool {
        !self.tool_calls.is_empty()
            || self
                .content
                .as_deref()
                .map(|c| !c.trim().is_empty())
                .unwrap_or(false)
    }
}

/// One streamed delta: `choices[0].delta` of a stream chunk.
#[derive(Debug, Clone, Default)]
pub struct ChatChunk {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallDelta>,
}

/// Lazy sequence of streamed chunks. Ends after the `[DONE]` sentinel;
/// yields `Err(WorkshopError::Cancelled)` when the token fires mid-stream.
pub type ChatStream = BoxStream<'static, Result<ChatChunk, WorkshopError>>;

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// A chat-completion backend. Implementations must honor the cancellation
/// token by aborting the underlying request.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider identifier (e.g. "openai").
    fn name(&self) -> &str;

    /// Unary completion.
    async fn chat(
        &self,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, WorkshopError>;

    /// Streaming completion. Chunks already yielded remain valid after a
    /// mid-stream cancellation.
    async fn chat_stream(
        &self,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatStream, WorkshopError>;

    /// Estimate token count for a text string.
    fn count_tokens(&self, text: &str) -> usize {
        text.len() / 4
    }
}
