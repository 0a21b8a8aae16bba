//! # OpenAI-Compatible Chat Provider
//!
//! Implements [`ChatProvider`] over a chat-completions endpoint. Supports
//! unary and streaming calls, tool use, and cooperative cancellation.
//! `tools`/`tool_choice` are sent only when the tool list is non-empty —
//! some compatible providers reject empty tool arrays.

pub mod sse;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use workshop_core::config::LlmSettings;
use workshop_core::provider::{ChatChunk, ChatOutcome, ChatProvider, ChatRequest, ChatStream};
use workshop_core::types::{ToolCall, ToolCallDelta};
use workshop_core::WorkshopError;

use crate::sse::SseLineParser;

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl From<&LlmSettings> for OpenAiConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        }
    }
}

pub struct OpenAiProvider {
    config: OpenAiConfig,
    http: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": request.messages,
            "temperature": request.temperature,
        });
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!(request.tool_choice.as_str());
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn send(
        &self,
        body: &Value,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, WorkshopError> {
        let request = self
            .http
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(body);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(WorkshopError::Cancelled),
            response = request.send() => {
                response.map_err(|e| WorkshopError::provider(format!("request failed: {e}")))?
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(WorkshopError::provider_status(
                status,
                format!("HTTP {status}: {text}"),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(
        &self,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome, WorkshopError> {
        let body = self.build_body(&request, false);
        debug!(model = %self.config.model, messages = request.messages.len(), "chat request");

        let response = self.send(&body, cancel).await?;
        let parsed: Value = tokio::select! {
            _ = cancel.cancelled() => return Err(WorkshopError::Cancelled),
            parsed = response.json::<Value>() => {
                parsed.map_err(|e| WorkshopError::provider(format!("invalid response body: {e}")))?
            }
        };
        Ok(parse_outcome(&parsed))
    }

    async fn chat_stream(
        &self,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatStream, WorkshopError> {
        let body = self.build_body(&request, true);
        debug!(model = %self.config.model, messages = request.messages.len(), "chat stream request");

        let response = self.send(&body, cancel).await?;
        let cancel = cancel.clone();
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<ChatChunk, WorkshopError>>(32);

        tokio::spawn(async move {
            let mut parser = SseLineParser::new();
            let mut bytes = response.bytes_stream();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = tx.send(Err(WorkshopError::Cancelled)).await;
                        return;
                    }
                    next = bytes.next() => match next {
                        Some(Ok(chunk)) => {
                            for payload in parser.feed(&chunk) {
                                if payload == "[DONE]" {
                                    return;
                                }
                                // Malformed JSON lines are chatter, not errors.
                                let Ok(value) = serde_json::from_str::<Value>(&payload) else {
                                    continue;
                                };
                                if let Some(chunk) = chunk_from_value(&value) {
                                    if tx.send(Ok(chunk)).await.is_err() {
                                        return;
                                    }
                                }
                            }
                        }
                        Some(Err(e)) => {
                            let _ = tx
                                .send(Err(WorkshopError::provider(format!("stream failed: {e}"))))
                                .await;
                            return;
                        }
                        None => return,
                    }
                }
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

/// Distill `choices[0].message` of a unary completion.
fn parse_outcome(parsed: &Value) -> ChatOutcome {
    let message = parsed
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"));

    let content = message
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(String::from);

    let tool_calls = message
        .and_then(|m| m.get("tool_calls"))
        .and_then(|tc| tc.as_array())
        .map(|calls| {
            calls
                .iter()
                .filter_map(|tc| {
                    let function = tc.get("function")?;
                    Some(ToolCall::function(
                        tc.get("id").and_then(|v| v.as_str()).unwrap_or(""),
                        function.get("name").and_then(|v| v.as_str()).unwrap_or(""),
                        function
                            .get("arguments")
                            .and_then(|v| v.as_str())
                            .unwrap_or(""),
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    ChatOutcome {
        content,
        tool_calls,
    }
}

/// Map `choices[0].delta` of a stream chunk, if present.
fn chunk_from_value(value: &Value) -> Option<ChatChunk> {
    let delta = value
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("delta"))?;

    let content = delta
        .get("content")
        .and_then(|c| c.as_str())
        .map(String::from);

    let tool_calls = delta
        .get("tool_calls")
        .and_then(|tc| tc.as_array())
        .map(|deltas| {
            deltas
                .iter()
                .map(|d| ToolCallDelta {
                    index: d.get("index").and_then(|v| v.as_u64()).map(|v| v as usize),
                    id: d.get("id").and_then(|v| v.as_str()).map(String::from),
                    name: d
                        .get("function")
                        .and_then(|f| f.get("name"))
                        .and_then(|v| v.as_str())
                        .map(String::from),
                    arguments: d
                        .get("function")
                        .and_then(|f| f.get("arguments"))
                        .and_then(|v| v.as_str())
                        .map(String::from),
                })
                .collect()
        })
        .unwrap_or_default();

    Some(ChatChunk {
        content,
        tool_calls,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
