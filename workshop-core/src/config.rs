//! Configuration
//!
//! Typed settings with layered merge. Collaborators load TOML files and
//! environment variables; the core owns the format, the defaults, and the
//! later-wins merge semantics.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Resolved runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind host.
    pub host: String,
    /// Server bind port.
    pub port: u16,
    /// Remote client base URL (e.g. "http://127.0.0.1:8787").
    pub base_url: Option<String>,
    /// Shared bearer token; absent means unauthenticated.
    pub token: Option<String>,
    /// Default user identity.
    pub user_id: Option<String>,
    /// Skip write confirmations.
    pub auto_approve: bool,
    pub agent: AgentSettings,
    pub llm: LlmSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Maximum assistant calls per turn.
    pub max_steps: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            base_url: None,
            token: None,
            user_id: None,
            auto_approve: false,
            agent: AgentSettings { max_steps: 12 },
            llm: LlmSettings {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                model: "gpt-4o-mini".to_string(),
            },
        }
    }
}

impl Settings {
    /// Apply overlays in order; later values win field-wise.
    pub fn merged(overlays: &[SettingsOverlay]) -> Self {
        let mut settings = Self::default();
        for overlay in overlays {
            settings.apply(overlay);
        }
        settings
    }

    pub fn apply(&mut self, overlay: &SettingsOverlay) {
        if let Some(host) = &overlay.host {
            self.host = host.clone();
        }
        if let Some(port) = overlay.port {
            self.port = port;
        }
        if let Some(base_url) = &overlay.base_url {
            self.base_url = Some(base_url.clone());
        }
        if let Some(token) = &overlay.token {
            self.token = Some(token.clone());
        }
        if let Some(user_id) = &overlay.user_id {
            self.user_id = Some(user_id.clone());
        }
        if let Some(auto_approve) = overlay.auto_approve {
            self.auto_approve = auto_approve;
        }
        if let Some(agent) = &overlay.agent {
            if let Some(max_steps) = agent.max_steps {
                self.agent.max_steps = max_steps;
            }
        }
        if let Some(llm) = &overlay.llm {
            if let Some(base_url) = &llm.base_url {
                self.llm.base_url = base_url.clone();
            }
            if let Some(api_key) = &llm.api_key {
                self.llm.api_key = api_key.clone();
            }
            if let Some(model) = &llm.model {
                self.llm.model = model.clone();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Overlays
// ---------------------------------------------------------------------------

/// A partial settings layer, loaded from a TOML document or an
/// environment map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsOverlay {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub auto_approve: Option<bool>,
    pub agent: Option<AgentOverlay>,
    pub llm: Option<LlmOverlay>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOverlay {
    pub max_steps: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmOverlay {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl SettingsOverlay {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse settings TOML")
    }

    /// Build an overlay from `WORKSHOP_*` variables in a caller-supplied
    /// map. Unparseable numeric/boolean values are ignored.
    pub fn from_env_map(vars: &HashMap<String, String>) -> Self {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();

        let agent = get("WORKSHOP_MAX_STEPS")
            .and_then(|v| v.parse().ok())
            .map(|max_steps| AgentOverlay {
                max_steps: Some(max_steps),
            });

        let llm_base_url = get("WORKSHOP_LLM_BASE_URL");
        let llm_api_key = get("WORKSHOP_LLM_API_KEY");
        let llm_model = get("WORKSHOP_LLM_MODEL");
        let llm = if llm_base_url.is_some() || llm_api_key.is_some() || llm_model.is_some() {
            Some(LlmOverlay {
                base_url: llm_base_url,
                api_key: llm_api_key,
                model: llm_model,
            })
        } else {
            None
        };

        Self {
            host: get("WORKSHOP_HOST"),
            port: get("WORKSHOP_PORT").and_then(|v| v.parse().ok()),
            base_url: get("WORKSHOP_BASE_URL"),
            token: get("WORKSHOP_TOKEN"),
            user_id: get("WORKSHOP_USER_ID"),
            auto_approve: get("WORKSHOP_AUTO_APPROVE").and_then(|v| v.parse().ok()),
            agent,
            llm,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.agent.max_steps, 12);
        assert!(!settings.auto_approve);
        assert_eq!(settings.port, 8787);
    }

    #[test]
    fn overlays_apply_in_order_later_wins() {
        let first = SettingsOverlay {
            agent: Some(AgentOverlay { max_steps: Some(5) }),
            ..Default::default()
        };
        let second = SettingsOverlay {
            agent: Some(AgentOverlay { max_steps: Some(9) }),
            ..Default::default()
        };
        let settings = Settings::merged(&[first, second]);
        assert_eq!(settings.agent.max_steps, 9);
    }

    #[test]
    fn env_overlay_beats_file_overlay() {
        let file = SettingsOverlay::from_toml_str("[agent]\nmax_steps = 20\n").unwrap();

        let mut vars = HashMap::new();
        vars.insert("WORKSHOP_MAX_STEPS".to_string(), "7".to_string());
        let env = SettingsOverlay::from_env_map(&vars);

        let settings = Settings::merged(&[file, env]);
        assert_eq!(settings.agent.max_steps, 7);
    }

    #[test]
    fn toml_overlay_parses_nested_sections() {
        let overlay = SettingsOverlay::from_toml_str(
            "port = 9000\nauto_approve = true\n\n[llm]\nmodel = \"gpt-4o\"\n",
        )
        .unwrap();
        let settings = Settings::merged(&[overlay]);
        assert_eq!(settings.port, 9000);
        assert!(settings.auto_approve);
        assert_eq!(settings.llm.model, "gpt-4o");
    }

    #[test]
    fn env_map_ignores_unparseable_values() {
        let mut vars = HashMap::new();
        vars.insert("WORKSHOP_PORT".to_string(), "not-a-port".to_string());
        vars.insert("WORKSHOP_HOST".to_string(), "0.0.0.0".to_string());
        let overlay = SettingsOverlay::from_env_map(&vars);
        assert!(overlay.port.is_none());
        assert_eq!(overlay.host.as_deref(), Some("0.0.0.0"));
    }
}
