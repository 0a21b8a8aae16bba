//! End-to-end server tests: a live axum server with a mock chat provider,
//! driven over HTTP by reqwest and the workshop client.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use workshop_client::{RemoteConfig, RemoteSession};
use workshop_core::provider::{ChatChunk, ChatOutcome, ChatProvider, ChatRequest, ChatStream};
use workshop_core::types::{Role, ToolCall, ToolCallDelta};
use workshop_core::WorkshopError;
use workshop_server::{router, AppState, ServerConfig};
use workshop_web::{WebClient, WebConfig};

// ---------------------------------------------------------------------------
// Mock providers
// ---------------------------------------------------------------------------

/// Streams a scripted outcome per call; repeats the last one when the
/// script runs dry.
struct ScriptedProvider {
    outcomes: std::sync::Mutex<Vec<ChatOutcome>>,
}

impl ScriptedProvider {
    fn text(content: &str) -> Arc<Self> {
        Arc::new(Self {
            outcomes: std::sync::Mutex::new(vec![ChatOutcome {
                content: Some(content.to_string()),
                tool_calls: vec![],
            }]),
        })
    }

    fn script(outcomes: Vec<ChatOutcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: std::sync::Mutex::new(outcomes),
        })
    }

    fn next(&self) -> ChatOutcome {
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            ChatOutcome {
                content: Some("done".to_string()),
                tool_calls: vec![],
            }
        } else {
            outcomes.remove(0)
        }
    }
}

fn outcome_to_chunks(outcome: ChatOutcome) -> Vec<Result<ChatChunk, WorkshopError>> {
    let mut chunks = Vec::new();
    if let Some(content) = outcome.content {
        for piece in content.split_inclusive(' ') {
            chunks.push(Ok(ChatChunk {
                content: Some(piece.to_string()),
                tool_calls: vec![],
            }));
        }
    }
    for (index, call) in outcome.tool_calls.iter().enumerate() {
        chunks.push(Ok(ChatChunk {
            content: None,
            tool_calls: vec![ToolCallDelta {
                index: Some(index),
                id: Some(call.id.clone()),
                name: Some(call.function.name.clone()),
                arguments: Some(call.function.arguments.clone()),
            }],
        }));
    }
    chunks
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }
    async fn chat(
        &self,
        _request: ChatRequest,
        _cancel: &CancellationToken,
    ) -> Result<ChatOutcome, WorkshopError> {
        Ok(self.next())
    }
    async fn chat_stream(
        &self,
        _request: ChatRequest,
        _cancel: &CancellationToken,
    ) -> Result<ChatStream, WorkshopError> {
        Ok(futures::stream::iter(outcome_to_chunks(self.next())).boxed())
    }
}

/// Blocks inside `chat_stream` until released, to hold a session busy.
struct GatedProvider {
    started: tokio::sync::Notify,
    gate: tokio::sync::Notify,
    calls: AtomicUsize,
}

impl GatedProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            started: tokio::sync::Notify::new(),
            gate: tokio::sync::Notify::new(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ChatProvider for GatedProvider {
    fn name(&self) -> &str {
        "gated"
    }
    async fn chat(
        &self,
        _request: ChatRequest,
        _cancel: &CancellationToken,
    ) -> Result<ChatOutcome, WorkshopError> {
        unreachable!("server always streams")
    }
    async fn chat_stream(
        &self,
        _request: ChatRequest,
        _cancel: &CancellationToken,
    ) -> Result<ChatStream, WorkshopError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.gate.notified().await;
        Ok(futures::stream::iter(vec![Ok(ChatChunk {
            content: Some("released".to_string()),
            tool_calls: vec![],
        })])
        .boxed())
    }
}

/// Echoes the previous tool result back as the final answer, so tests can
/// observe what the loop fed the model.
struct ToolThenEchoProvider {
    calls: AtomicUsize,
    tool_call: ToolCall,
}

#[async_trait]
impl ChatProvider for ToolThenEchoProvider {
    fn name(&self) -> &str {
        "tool-then-echo"
    }
    async fn chat(
        &self,
        _request: ChatRequest,
        _cancel: &CancellationToken,
    ) -> Result<ChatOutcome, WorkshopError> {
        unreachable!("server always streams")
    }
    async fn chat_stream(
        &self,
        request: ChatRequest,
        _cancel: &CancellationToken,
    ) -> Result<ChatStream, WorkshopError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = if call == 0 {
            ChatOutcome {
                content: None,
                tool_calls: vec![self.tool_call.clone()],
            }
        } else {
            let last_tool = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::Tool)
                .and_then(|m| m.content.clone())
                .unwrap_or_default();
            ChatOutcome {
                content: Some(last_tool),
                tool_calls: vec![],
            }
        };
        Ok(futures::stream::iter(outcome_to_chunks(outcome)).boxed())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct TestServer {
    addr: SocketAddr,
    _base_dir: tempfile::TempDir,
}

impl TestServer {
    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn spawn_server(provider: Arc<dyn ChatProvider>, token: Option<&str>) -> TestServer {
    let base_dir = tempfile::tempdir().expect("tempdir");
    let config = ServerConfig::new(base_dir.path()).with_token(token.map(String::from));
    let state = Arc::new(AppState::new(
        config,
        provider,
        Arc::new(WebClient::new(WebConfig::default())),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.expect("serve");
    });

    TestServer {
        addr,
        _base_dir: base_dir,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_endpoint() {
    let server = spawn_server(ScriptedProvider::text("hi"), None).await;
    let body: serde_json::Value = reqwest::get(format!("{}/health", server.url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn chat_streams_session_tokens_then_done() {
    let server = spawn_server(ScriptedProvider::text("Hello from mock"), None).await;
    let client = RemoteSession::new(RemoteConfig::new(server.url()));

    let tokens = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
    let on_token = {
        let tokens = tokens.clone();
        Arc::new(move |t: &str| tokens.lock().unwrap().push(t.to_string()))
            as workshop_client::TokenCallback
    };

    let reply = client
        .send("hello", Some(on_token), None, None)
        .await
        .unwrap();

    assert_eq!(reply, "Hello from mock");
    assert_eq!(tokens.lock().unwrap().join(""), "Hello from mock");
    assert!(client.session_id().await.is_some(), "session id cached");
}

#[tokio::test]
async fn second_send_reuses_session() {
    let server = spawn_server(
        ScriptedProvider::script(vec![
            ChatOutcome {
                content: Some("first".to_string()),
                tool_calls: vec![],
            },
            ChatOutcome {
                content: Some("second".to_string()),
                tool_calls: vec![],
            },
        ]),
        None,
    )
    .await;
    let client = RemoteSession::new(RemoteConfig::new(server.url()));

    client.send("one", None, None, None).await.unwrap();
    let first_id = client.session_id().await.unwrap();
    client.send("two", None, None, None).await.unwrap();
    assert_eq!(client.session_id().await.unwrap(), first_id);
}

#[tokio::test]
async fn busy_session_returns_conflict() {
    let provider = GatedProvider::new();
    let server = spawn_server(provider.clone(), None).await;
    let http = reqwest::Client::new();

    let created: serde_json::Value = http
        .post(format!("{}/session", server.url()))
        .json(&serde_json::json!({ "userId": "worker" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = created["sessionId"].as_str().unwrap().to_string();

    // First turn parks inside the provider, holding the session busy.
    let first = {
        let http = http.clone();
        let url = format!("{}/chat", server.url());
        let session_id = session_id.clone();
        tokio::spawn(async move {
            http.post(url)
                .json(&serde_json::json!({ "message": "go", "sessionId": session_id }))
                .send()
                .await
                .unwrap()
                .text()
                .await
                .unwrap()
        })
    };
    provider.started.notified().await;

    let second = http
        .post(format!("{}/chat", server.url()))
        .json(&serde_json::json!({ "message": "again", "sessionId": session_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 409);

    provider.gate.notify_one();
    let body = first.await.unwrap();
    assert!(body.contains("released"));
    assert!(body.contains("\"done\""));
}

#[tokio::test]
async fn bearer_token_is_enforced() {
    let server = spawn_server(ScriptedProvider::text("secret ok"), Some("hunter2")).await;
    let http = reqwest::Client::new();

    // /health stays open.
    let health = reqwest::get(format!("{}/health", server.url())).await.unwrap();
    assert_eq!(health.status(), 200);

    let denied = http
        .post(format!("{}/chat", server.url()))
        .json(&serde_json::json!({ "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), 401);

    let wrong = http
        .post(format!("{}/chat", server.url()))
        .bearer_auth("wrong")
        .json(&serde_json::json!({ "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);

    let mut config = RemoteConfig::new(server.url());
    config.token = Some("hunter2".to_string());
    let client = RemoteSession::new(config);
    let reply = client.send("hi", None, None, None).await.unwrap();
    assert_eq!(reply, "secret ok");
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let server = spawn_server(ScriptedProvider::text("hi"), None).await;
    let http = reqwest::Client::new();

    let chat = http
        .post(format!("{}/chat", server.url()))
        .json(&serde_json::json!({ "message": "hi", "sessionId": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(chat.status(), 404);

    let reset = http
        .post(format!("{}/reset", server.url()))
        .json(&serde_json::json!({ "sessionId": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(reset.status(), 404);
}

#[tokio::test]
async fn empty_message_is_bad_request() {
    let server = spawn_server(ScriptedProvider::text("hi"), None).await;
    let response = reqwest::Client::new()
        .post(format!("{}/chat", server.url()))
        .json(&serde_json::json!({ "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn reset_clears_conversation() {
    let server = spawn_server(ScriptedProvider::text("hi"), None).await;
    let client = RemoteSession::new(RemoteConfig::new(server.url()));

    client.send("hello", None, None, None).await.unwrap();
    client.reset().await.unwrap();
}

#[tokio::test]
async fn remote_writes_are_denied_without_auto_approve() {
    let provider = Arc::new(ToolThenEchoProvider {
        calls: AtomicUsize::new(0),
        tool_call: ToolCall::function(
            "c1",
            "fs_write",
            "{\"path\":\"a.txt\",\"content\":\"x\"}",
        ),
    });
    let server = spawn_server(provider, None).await;
    let client = RemoteSession::new(RemoteConfig::new(server.url()));

    let reply = client.send("write a file", None, None, None).await.unwrap();
    assert!(
        reply.contains("User declined write operation"),
        "reply: {reply}"
    );
}

#[tokio::test]
async fn user_ids_are_sanitized_into_workspace_paths() {
    use workshop_server::sanitize_user_id;
    assert_eq!(sanitize_user_id(Some("we/ird us@er")), "we_ird_us_er");
    assert_eq!(sanitize_user_id(None), "default");
}
