//! Specialist Agent Runner
//!
//! Single-shot, non-tool provider call with a specialist system prompt.
//! The main loop injects the returned text into the conversation as a
//! synthesized system note.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::WorkshopError;
use crate::provider::{ChatProvider, ChatRequest, ToolChoice};
use crate::router::AgentProfile;
use crate::types::Message;

/// Invoke the specialist once and return the trimmed text.
pub async fn run_specialist(
    provider: &Arc<dyn ChatProvider>,
    profile: &AgentProfile,
    request: &str,
    cancel: &CancellationToken,
) -> Result<String, WorkshopError> {
    debug!(agent = profile.id, "running specialist agent");

    let messages = vec![Message::system(profile.system_prompt), Message::user(request)];
    let chat = ChatRequest::new(messages)
        .with_tool_choice(ToolChoice::None)
        .with_temperature(0.2);

    let outcome = provider.chat(chat, cancel).await?;
    Ok(outcome.content.unwrap_or_default().trim().to_string())
}

/// The system note the loop appends after a specialist runs.
pub fn specialist_note(name: &str, text: &str) -> String {
    format!(
        "Specialist agent ({name}) output:\n{text}\nUse this as draft guidance and respond to the user."
    )
}
