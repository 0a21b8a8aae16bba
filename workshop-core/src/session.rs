//! Session State
//!
//! A session is a conversation plus its sandbox root and logger. Owned by
//! either a local process or the remote server's registry; destroyed on
//! process exit.

use std::path::PathBuf;

use uuid::Uuid;

use crate::logger::SessionLogger;
use crate::types::Conversation;

/// Default system prompt for the main loop.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a capable assistant with access to tools \
for web search, fetching pages, reading and writing files inside a workspace, applying \
patches, and summarizing documents. Use tools when they help; answer directly when they \
don't. Keep answers grounded in tool results.";

/// A single assistant session.
pub struct Session {
    pub id: String,
    pub conversation: Conversation,
    /// Canonical sandbox root; all file tools are confined to it.
    pub workspace_root: PathBuf,
    pub user_id: String,
    pub logger: Option<SessionLogger>,
}

impl Session {
    pub fn new(
        system_prompt: &str,
        workspace_root: PathBuf,
        user_id: impl Into<String>,
        logger: Option<SessionLogger>,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        tracing::info!(session_id = %id, "created session");
        Self {
            id,
            conversation: Conversation::new(system_prompt),
            workspace_root,
            user_id: user_id.into(),
            logger,
        }
    }

    /// Clear the conversation back to a single system message.
    pub fn reset(&mut self, system_prompt: &str) {
        self.conversation.reset(system_prompt);
        tracing::info!(session_id = %self.id, "reset session");
    }
}
