//! Agent Loop
//!
//! The bounded reason/act loop at the center of the runtime: call the
//! provider, execute any requested tools, feed results back, repeat until
//! the model answers in text or the step limit is reached.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WorkshopError;
use crate::provider::{ChatOutcome, ChatProvider, ChatRequest};
use crate::registry::ToolRegistry;
use crate::router::route;
use crate::session::Session;
use crate::specialist::{run_specialist, specialist_note};
use crate::stream::ToolCallAssembler;
use crate::types::{Message, Role, ToolCall};

// ---------------------------------------------------------------------------
// Observer events and collaborators
// ---------------------------------------------------------------------------

/// Events delivered to the observer during a turn. The core never reaches
/// back into host state; hosts react to these instead.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A streamed content token.
    Token(String),
    /// A specialist agent produced a pre-turn note.
    AgentNote { name: String, content: String },
}

/// Single observer callback for all loop events.
pub type EventSink = Arc<dyn Fn(AgentEvent) + Send + Sync>;

/// Asks the user to approve a write operation. Returning `false` turns the
/// tool call into a declined-write result.
pub type ConfirmFn = Arc<dyn Fn(String) -> BoxFuture<'static, bool> + Send + Sync>;

// ---------------------------------------------------------------------------
// Configuration and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    /// Maximum assistant calls per turn.
    pub max_steps: usize,
    /// Skip write confirmations entirely.
    pub auto_approve: bool,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 12,
            auto_approve: false,
        }
    }
}

/// Bookkeeping for a completed turn.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub final_text: String,
    /// Assistant calls made.
    pub steps: usize,
    /// Tool calls executed.
    pub tool_calls: usize,
}

// ---------------------------------------------------------------------------
// Agent loop
// ---------------------------------------------------------------------------

pub struct AgentLoop {
    provider: Arc<dyn ChatProvider>,
    registry: Arc<ToolRegistry>,
    config: AgentLoopConfig,
    confirm: Option<ConfirmFn>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        registry: Arc<ToolRegistry>,
        config: AgentLoopConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            config,
            confirm: None,
        }
    }

    /// Attach the write-confirmation collaborator.
    pub fn with_confirm(mut self, confirm: ConfirmFn) -> Self {
        self.confirm = Some(confirm);
        self
    }

    pub fn config(&self) -> &AgentLoopConfig {
        &self.config
    }

    /// Run one turn and return the final text.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        text: &str,
        events: Option<EventSink>,
        cancel: &CancellationToken,
    ) -> Result<String, WorkshopError> {
        self.run_turn_report(session, text, events, cancel)
            .await
            .map(|report| report.final_text)
    }

    /// Run one turn and return the final text plus bookkeeping.
    pub async fn run_turn_report(
        &self,
        session: &mut Session,
        text: &str,
        events: Option<EventSink>,
        cancel: &CancellationToken,
    ) -> Result<TurnReport, WorkshopError> {
        session.conversation.push(Message::user(text));
        if let Some(logger) = &session.logger {
            logger.message(Role::User, Some(text), &[]);
        }

        if let Some(decision) = route(text) {
            info!(
                session_id = %session.id,
                agent = decision.agent.id,
                reason = %decision.reason,
                "specialist agent selected"
            );
            let output = run_specialist(&self.provider, decision.agent, text, cancel).await?;
            if let Some(sink) = &events {
                sink(AgentEvent::AgentNote {
                    name: decision.agent.name.to_string(),
                    content: output.clone(),
                });
            }
            if let Some(logger) = &session.logger {
                logger.agent(decision.agent.id, decision.agent.name, &decision.reason, &output);
            }
            session
                .conversation
                .push(Message::system(specialist_note(decision.agent.name, &output)));
        }

        let mut tool_calls_total = 0;

        for step in 0..self.config.max_steps {
            if cancel.is_cancelled() {
                info!(session_id = %session.id, step, "turn cancelled");
                return Err(WorkshopError::Cancelled);
            }

            debug!(session_id = %session.id, step, "agent loop step");
            let request = ChatRequest::new(session.conversation.messages().to_vec())
                .with_tools(self.registry.definitions());

            let outcome = match &events {
                Some(sink) => self.stream_step(request, sink, cancel).await?,
                None => self.provider.chat(request, cancel).await?,
            };

            if !outcome.is_usable() {
                warn!(session_id = %session.id, step, "provider returned nothing usable");
                return Ok(TurnReport {
                    final_text: "No response from model.".to_string(),
                    steps: step + 1,
                    tool_calls: tool_calls_total,
                });
            }

            session.conversation.push(Message::assistant_with_tools(
                outcome.content.clone(),
                outcome.tool_calls.clone(),
            ));
            if let Some(logger) = &session.logger {
                logger.message(Role::Assistant, outcome.content.as_deref(), &outcome.tool_calls);
            }

            if !outcome.tool_calls.is_empty() {
                info!(
                    session_id = %session.id,
                    step,
                    count = outcome.tool_calls.len(),
                    "executing tool calls"
                );
                for call in &outcome.tool_calls {
                    self.execute_tool_call(session, call).await;
                    tool_calls_total += 1;
                }
                continue;
            }

            if let Some(content) = outcome.content {
                if !content.trim().is_empty() {
                    return Ok(TurnReport {
                        final_text: content,
                        steps: step + 1,
                        tool_calls: tool_calls_total,
                    });
                }
            }
        }

        warn!(
            session_id = %session.id,
            max_steps = self.config.max_steps,
            "turn hit step limit"
        );
        Ok(TurnReport {
            final_text: format!(
                "Reached max steps ({}) without final response.",
                self.config.max_steps
            ),
            steps: self.config.max_steps,
            tool_calls: tool_calls_total,
        })
    }

    /// Drive one streaming provider call, emitting tokens as they arrive
    /// and assembling tool-call deltas into complete calls. The assistant
    /// message is appended by the caller only after the stream completes.
    async fn stream_step(
        &self,
        request: ChatRequest,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, WorkshopError> {
        let mut stream = self.provider.chat_stream(request, cancel).await?;
        let mut content = String::new();
        let mut assembler = ToolCallAssembler::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(text) = chunk.content {
                if !text.is_empty() {
                    content.push_str(&text);
                    sink(AgentEvent::Token(text));
                }
            }
            for delta in &chunk.tool_calls {
                assembler.apply(delta);
            }
        }

        Ok(ChatOutcome {
            content: if content.is_empty() {
                None
            } else {
                Some(content)
            },
            tool_calls: assembler.finish(),
        })
    }

    /// Execute one tool call and append its result message. Failures are
    /// embedded in the result so the model can react; they never abort
    /// the turn.
    async fn execute_tool_call(&self, session: &mut Session, call: &ToolCall) {
        let name = &call.function.name;
        let result = self.tool_result(session, call).await;
        if let Some(logger) = &session.logger {
            logger.tool_result(name, &result);
        }
        session
            .conversation
            .push(Message::tool(call.id.as_str(), result.to_string()));
    }

    async fn tool_result(&self, session: &Session, call: &ToolCall) -> serde_json::Value {
        let name = &call.function.name;

        let args: serde_json::Value = match serde_json::from_str(&call.function.arguments) {
            Ok(args) => args,
            Err(_) => {
                if let Some(logger) = &session.logger {
                    logger.tool_call(name, &json!(call.function.arguments));
                }
                warn!(tool = %name, "tool arguments were not valid JSON");
                return json!({ "error": format!("Invalid tool arguments for {name}") });
            }
        };
        if let Some(logger) = &session.logger {
            logger.tool_call(name, &args);
        }

        let Some(tool) = self.registry.get(name) else {
            warn!(tool = %name, "unknown tool requested");
            return json!({ "error": format!("Unknown tool: {name}") });
        };

        if tool.writable && !self.config.auto_approve {
            if let Some(confirm) = &self.confirm {
                let question = format!("Allow '{name}' to modify the workspace?");
                if !confirm(question).await {
                    info!(tool = %name, "write operation declined");
                    return json!({ "error": "User declined write operation" });
                }
            }
        }

        match (tool.handler)(args).await {
            Ok(value) => value,
            Err(e) => json!({ "error": e.to_string() }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
