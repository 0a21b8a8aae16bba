//! # Workshop Client
//!
//! Remote session client: sends a message to the server, consumes the
//! SSE stream, mirrors `token`/`agent` events to callbacks, and returns
//! the reassembled response. The session id from the first `session`
//! event is cached and reused on subsequent sends.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use workshop_core::WorkshopError;

/// Called for each streamed token.
pub type TokenCallback = Arc<dyn Fn(&str) + Send + Sync>;
/// Called with `(name, content)` when a specialist agent ran.
pub type AgentCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub user_id: Option<String>,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            user_id: None,
        }
    }
}

/// A remote session handle.
pub struct RemoteSession {
    config: RemoteConfig,
    http: reqwest::Client,
    session_id: Mutex<Option<String>>,
}

impl RemoteSession {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            session_id: Mutex::new(None),
        }
    }

    /// The cached session id, once the server has issued one.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.lock().await.clone()
    }

    /// Send a message and return the concatenated, trimmed response.
    pub async fn send(
        &self,
        message: &str,
        on_token: Option<TokenCallback>,
        on_agent: Option<AgentCallback>,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, WorkshopError> {
        let mut body = json!({ "message": message });
        if let Some(session_id) = self.session_id.lock().await.as_deref() {
            body["sessionId"] = json!(session_id);
        }
        if let Some(user_id) = &self.config.user_id {
            body["userId"] = json!(user_id);
        }

        let url = format!("{}/chat", self.config.base_url.trim_end_matches('/'));
        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WorkshopError::provider(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(error_from_status(response).await);
        }

        let mut bytes = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut output = String::new();

        loop {
            let next = match cancel {
                Some(cancel) => tokio::select! {
                    _ = cancel.cancelled() => return Err(WorkshopError::Cancelled),
                    next = bytes.next() => next,
                },
                None => bytes.next().await,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk =
                chunk.map_err(|e| WorkshopError::provider(format!("stream failed: {e}")))?;
            buffer.extend_from_slice(&chunk);

            for payload in drain_data_lines(&mut buffer) {
                let Ok(event) = serde_json::from_str::<Value>(&payload) else {
                    continue;
                };
                match event["type"].as_str() {
                    Some("session") => {
                        if let Some(id) = event["sessionId"].as_str() {
                            debug!(session_id = id, "session established");
                            *self.session_id.lock().await = Some(id.to_string());
                        }
                    }
                    Some("token") => {
                        if let Some(token) = event["token"].as_str() {
                            output.push_str(token);
                            if let Some(cb) = &on_token {
                                cb(token);
                            }
                        }
                    }
                    Some("agent") => {
                        if let Some(cb) = &on_agent {
                            cb(
                                event["name"].as_str().unwrap_or(""),
                                event["content"].as_str().unwrap_or(""),
                            );
                        }
                    }
                    Some("error") => {
                        let message = event["message"].as_str().unwrap_or("unknown error");
                        return Err(WorkshopError::provider(message));
                    }
                    Some("done") => return Ok(output.trim().to_string()),
                    _ => {}
                }
            }
        }

        // Stream ended without a terminal event.
        Ok(output.trim().to_string())
    }

    /// Reset the remote conversation. A no-op when no session exists yet.
    pub async fn reset(&self) -> Result<(), WorkshopError> {
        let Some(session_id) = self.session_id.lock().await.clone() else {
            return Ok(());
        };

        let url = format!("{}/reset", self.config.base_url.trim_end_matches('/'));
        let mut request = self
            .http
            .post(&url)
            .json(&json!({ "sessionId": session_id }));
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| WorkshopError::provider(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(error_from_status(response).await);
        }
        Ok(())
    }
}

/// Drain complete lines from the buffer and return their `data:` payloads.
fn drain_data_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=newline).collect();
        let Ok(line) = std::str::from_utf8(&line) else {
            continue;
        };
        let line = line.trim_end_matches(['\n', '\r']);
        if let Some(payload) = line.strip_prefix("data:") {
            let payload = payload.trim();
            if !payload.is_empty() {
                payloads.push(payload.to_string());
            }
        }
    }
    payloads
}

async fn error_from_status(response: reqwest::Response) -> WorkshopError {
    let status = response.status().as_u16();
    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|v| v["error"].as_str().map(String::from))
        .unwrap_or_else(|| format!("HTTP {status}"));
    match status {
        401 => WorkshopError::Unauthorized,
        404 => WorkshopError::NotFound(message),
        409 => WorkshopError::Busy,
        400 => WorkshopError::InvalidInput(message),
        _ => WorkshopError::provider_status(status, message),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_complete_data_lines_only() {
        let mut buffer = b"data: {\"type\":\"token\",\"token\":\"hi\"}\n\ndata: {\"par".to_vec();
        let payloads = drain_data_lines(&mut buffer);
        assert_eq!(payloads, vec!["{\"type\":\"token\",\"token\":\"hi\"}"]);
        assert_eq!(buffer, b"data: {\"par".to_vec());

        buffer.extend_from_slice(b"tial\":1}\n");
        let payloads = drain_data_lines(&mut buffer);
        assert_eq!(payloads, vec!["{\"partial\":1}"]);
    }
}
