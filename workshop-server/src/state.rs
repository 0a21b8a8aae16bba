//! Server State
//!
//! The session registry and per-session wiring: workspace root, tool
//! registry, agent loop, and the busy flag that serializes turns.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::info;

use workshop_core::agent_loop::{AgentLoop, AgentLoopConfig, ConfirmFn};
use workshop_core::config::Settings;
use workshop_core::provider::ChatProvider;
use workshop_core::registry::ToolRegistry;
use workshop_core::{Session, SessionLogger, WorkshopError, DEFAULT_SYSTEM_PROMPT};
use workshop_provider_openai::{OpenAiConfig, OpenAiProvider};
use workshop_sandbox::{ensure_root, register_fs_tools};
use workshop_web::{register_summarizer_tool, register_web_tools, Summarizer, WebClient, WebConfig};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory holding `workspaces/<user>` sandboxes and session logs.
    pub base_dir: PathBuf,
    /// Shared bearer token; `None` disables auth.
    pub token: Option<String>,
    /// When off, the injected confirm denies every write — there is no
    /// interactive channel over HTTP.
    pub auto_approve: bool,
    pub max_steps: usize,
    pub system_prompt: String,
}

impl ServerConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            token: None,
            auto_approve: false,
            max_steps: 12,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            token: settings.token.clone(),
            auto_approve: settings.auto_approve,
            max_steps: settings.agent.max_steps,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        self.auto_approve = auto_approve;
        self
    }
}

// ---------------------------------------------------------------------------
// Session registry
// ---------------------------------------------------------------------------

/// One hosted session: its state, its loop, and the turn-serializing
/// busy flag.
pub struct SessionRecord {
    pub session: Mutex<Session>,
    pub agent: AgentLoop,
    pub busy: AtomicBool,
    pub user_id: String,
    pub workspace_root: PathBuf,
}

pub struct AppState {
    pub config: ServerConfig,
    provider: Arc<dyn ChatProvider>,
    web: Arc<WebClient>,
    sessions: RwLock<HashMap<String, Arc<SessionRecord>>>,
}

impl AppState {
    pub fn new(config: ServerConfig, provider: Arc<dyn ChatProvider>, web: Arc<WebClient>) -> Self {
        Self {
            config,
            provider,
            web,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Wire the default OpenAI-compatible provider and web client from
    /// resolved settings.
    pub fn from_settings(settings: &Settings, base_dir: impl Into<PathBuf>) -> Self {
        let provider = Arc::new(OpenAiProvider::new(OpenAiConfig::from(&settings.llm)));
        let web = Arc::new(WebClient::new(WebConfig::default()));
        Self::new(
            ServerConfig::from_settings(settings, base_dir),
            provider,
            web,
        )
    }

    pub async fn get_session(&self, session_id: &str) -> Option<Arc<SessionRecord>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Create a session for `user_id` and register it. Returns the new
    /// session id and its record.
    pub async fn create_session(
        &self,
        user_id: &str,
    ) -> Result<(String, Arc<SessionRecord>), WorkshopError> {
        let workspace_root = ensure_root(
            &self
                .config
                .base_dir
                .join("workspaces")
                .join(user_id),
        )
        .map_err(WorkshopError::from)?;

        let logger = SessionLogger::create(&self.config.base_dir);
        let session = Session::new(
            &self.config.system_prompt,
            workspace_root.clone(),
            user_id,
            logger,
        );
        let session_id = session.id.clone();

        let mut registry = ToolRegistry::new();
        register_fs_tools(&mut registry, &workspace_root);
        register_web_tools(&mut registry, self.web.clone());
        let summarizer = Summarizer::new(
            self.provider.clone(),
            self.web.clone(),
            workspace_root.clone(),
        );
        register_summarizer_tool(&mut registry, Arc::new(summarizer));

        let loop_config = AgentLoopConfig {
            max_steps: self.config.max_steps,
            auto_approve: self.config.auto_approve,
        };
        let mut agent = AgentLoop::new(self.provider.clone(), Arc::new(registry), loop_config);
        if !self.config.auto_approve {
            // No interactive channel exists over HTTP.
            let deny: ConfirmFn = Arc::new(|_| Box::pin(async { false }));
            agent = agent.with_confirm(deny);
        }

        let record = Arc::new(SessionRecord {
            session: Mutex::new(session),
            agent,
            busy: AtomicBool::new(false),
            user_id: user_id.to_string(),
            workspace_root: workspace_root.clone(),
        });

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), record.clone());
        info!(session_id = %session_id, user = user_id, root = %workspace_root.display(), "session registered");
        Ok((session_id, record))
    }
}

// ---------------------------------------------------------------------------
// User identity
// ---------------------------------------------------------------------------

/// Restrict a user id to `[A-Za-z0-9_-]`, cap it at 64 characters, and
/// fall back to `"default"` when nothing is left.
pub fn sanitize_user_id(raw: Option<&str>) -> String {
    let raw = raw.unwrap_or("default").trim();
    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    if sanitized.is_empty() {
        "default".to_string()
    } else {
        sanitized
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
