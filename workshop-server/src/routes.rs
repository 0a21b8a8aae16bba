//! HTTP Routes
//!
//! `/health`, `/session`, `/reset`, and the SSE-streaming `/chat`. Known
//! error kinds map to 400/401/404/409; everything else is a 500.

use std::convert::Infallible;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use workshop_core::agent_loop::{AgentEvent, EventSink};
use workshop_core::estimate_tokens;

use crate::state::{sanitize_user_id, AppState, SessionRecord};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/session", post(create_session))
        .route("/reset", post(reset_session))
        .route("/chat", post(chat))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SessionBody {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetBody {
    session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    message: String,
    session_id: Option<String>,
    user_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Every endpoint except `/health` requires the bearer token when one is
/// configured.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = state.config.token.as_deref() else {
        return Ok(());
    };
    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented == Some(expected) {
        Ok(())
    } else {
        Err(error_response(StatusCode::UNAUTHORIZED, "unauthorized"))
    }
}

fn user_id_from(body_user: Option<&str>, headers: &HeaderMap) -> String {
    let header_user = headers.get("x-user-id").and_then(|v| v.to_str().ok());
    sanitize_user_id(body_user.or(header_user))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<SessionBody>>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let user_id = user_id_from(body.user_id.as_deref(), &headers);

    match state.create_session(&user_id).await {
        Ok((session_id, _)) => Json(json!({ "sessionId": session_id })).into_response(),
        Err(e) => {
            warn!(err = %e, "session creation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn reset_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ResetBody>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    let Some(record) = state.get_session(&body.session_id).await else {
        return error_response(StatusCode::NOT_FOUND, "unknown session");
    };
    record.session.lock().await.reset(&state.config.system_prompt);
    Json(json!({ "ok": true })).into_response()
}

async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Response {
    if let Err(resp) = authorize(&state, &headers) {
        return resp;
    }
    if body.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message is required");
    }
    let user_id = user_id_from(body.user_id.as_deref(), &headers);

    let (record, is_new) = match &body.session_id {
        Some(id) => match state.get_session(id).await {
            Some(record) => (record, false),
            None => return error_response(StatusCode::NOT_FOUND, "unknown session"),
        },
        None => match state.create_session(&user_id).await {
            Ok((_, record)) => (record, true),
            Err(e) => {
                warn!(err = %e, "session creation failed");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
            }
        },
    };

    // One turn at a time per session.
    if record
        .busy
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return error_response(StatusCode::CONFLICT, "session is busy");
    }

    let preview: String = body.message.chars().take(200).collect();
    info!(
        user = %record.user_id,
        chars = body.message.len(),
        est_tokens = estimate_tokens(&body.message),
        preview = %preview,
        "chat turn started"
    );

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<serde_json::Value>();

    run_turn_task(record, body.message, is_new, tx);

    let stream = UnboundedReceiverStream::new(rx)
        .map(|value| Ok::<Event, Infallible>(Event::default().data(value.to_string())));

    let headers = [
        ("Cache-Control", "no-cache"),
        ("Connection", "keep-alive"),
        ("X-Accel-Buffering", "no"),
    ];
    (headers, Sse::new(stream)).into_response()
}

/// Drive one turn in the background, forwarding loop events into the SSE
/// channel. The busy flag is cleared unconditionally; a disconnected
/// client only makes the sends no-ops while the turn runs to completion.
fn run_turn_task(
    record: Arc<SessionRecord>,
    message: String,
    is_new: bool,
    tx: tokio::sync::mpsc::UnboundedSender<serde_json::Value>,
) {
    tokio::spawn(async move {
        let started = Instant::now();

        if is_new {
            let session_id = record.session.lock().await.id.clone();
            let _ = tx.send(json!({ "type": "session", "sessionId": session_id }));
        }

        let sink: EventSink = {
            let tx = tx.clone();
            Arc::new(move |event: AgentEvent| {
                let value = match event {
                    AgentEvent::Token(token) => json!({ "type": "token", "token": token }),
                    AgentEvent::AgentNote { name, content } => {
                        json!({ "type": "agent", "name": name, "content": content })
                    }
                };
                let _ = tx.send(value);
            })
        };

        let cancel = CancellationToken::new();
        let result = {
            let mut session = record.session.lock().await;
            record
                .agent
                .run_turn_report(&mut session, &message, Some(sink), &cancel)
                .await
        };

        match &result {
            Ok(report) => {
                info!(
                    user = %record.user_id,
                    steps = report.steps,
                    tool_calls = report.tool_calls,
                    out_chars = report.final_text.len(),
                    out_tokens = estimate_tokens(&report.final_text),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "chat turn finished"
                );
                let _ = tx.send(json!({ "type": "done" }));
            }
            Err(e) => {
                warn!(user = %record.user_id, err = %e, "chat turn failed");
                let _ = tx.send(json!({ "type": "error", "message": e.to_string() }));
            }
        }

        record.busy.store(false, Ordering::SeqCst);
    });
}
