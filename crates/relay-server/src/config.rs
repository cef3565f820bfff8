//! Configuration file support.
//!
//! Business categorization (channels, case categories, their action
//! lists) is configuration, not engine logic: editing this file changes
//! the compiled conversation graph, never the code.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for the relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    pub bind: String,
    /// Checkpoint directory; platform data dir when unset.
    pub checkpoint_dir: Option<PathBuf>,
    /// Reasoning-step budget per inbound message.
    pub step_budget: u32,
    /// Name of the top-level supervisor node.
    pub supervisor_name: String,
    /// Base system prompt for the supervisor; the reachable-agent
    /// listing is appended at graph build time.
    pub supervisor_prompt: String,
    pub model: ModelConfig,
    pub channels: Vec<ChannelConfig>,
    pub case_categories: Vec<CaseCategoryConfig>,
}

/// Model endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Wall-clock timeout per model call, in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_secs: 60,
        }
    }
}

/// One communication channel; each gets its own compiled graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    pub name: String,
    /// Channel writing rules injected into every agent prompt.
    pub instructions: String,
}

/// One case category handled by a dedicated case agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseCategoryConfig {
    pub name: String,
    pub description: String,
    /// Case-handling instructions (the agent's prompt core).
    pub instructions: String,
    /// When the agent should hand the case back or to a human.
    #[serde(default)]
    pub handoff_conditions: String,
    /// Action ids from the catalogue, compiled into tool-agents.
    #[serde(default)]
    pub actions: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".into(),
            checkpoint_dir: None,
            step_budget: 24,
            supervisor_name: "conversation_supervisor".into(),
            supervisor_prompt: "You are the supervisor of a customer service team. Read the \
                                conversation, then either answer the customer directly for \
                                trivial questions or transfer the case to the one agent best \
                                suited to handle it. Never invent order data yourself."
                .into(),
            model: ModelConfig::default(),
            channels: vec![ChannelConfig {
                id: "email".into(),
                name: "Email".into(),
                instructions: "Write complete, polite emails with a greeting and a sign-off."
                    .into(),
            }],
            case_categories: vec![
                CaseCategoryConfig {
                    name: "Refunds and Cancellations".into(),
                    description: "Handles refund requests and order cancellations.".into(),
                    instructions: "You resolve refund and cancellation requests. Look up the \
                                   order first, confirm the refund with a real agent before \
                                   processing it, then report the outcome to the customer."
                        .into(),
                    handoff_conditions: "Hand back to the supervisor if the request is not \
                                         about a refund or cancellation."
                        .into(),
                    actions: vec!["act_order_lookup".into(), "act_process_refund".into()],
                },
                CaseCategoryConfig {
                    name: "Account Address Update".into(),
                    description: "Updates shipping and billing addresses on existing orders."
                        .into(),
                    instructions: "You update shipping addresses. Read the current order data, \
                                   apply the change, and double-check it was actually applied."
                        .into(),
                    handoff_conditions: "Hand back to the supervisor for anything that is not \
                                         an address change."
                        .into(),
                    actions: vec![
                        "act_order_lookup".into(),
                        "act_update_shipping_address".into(),
                    ],
                },
            ],
        }
    }
}

impl ServerConfig {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relay")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("RELAY_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the given path, or the default location.
    /// Missing or unparseable files fall back to the defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save config to the given path.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_usable() {
        let config = ServerConfig::default();
        assert!(!config.channels.is_empty());
        assert!(!config.case_categories.is_empty());
        assert!(config.step_budget > 0);
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = ServerConfig::default();
        config.save(&path).unwrap();

        let loaded = ServerConfig::load(Some(&path));
        assert_eq!(loaded.bind, config.bind);
        assert_eq!(loaded.case_categories.len(), config.case_categories.len());
        assert_eq!(loaded.case_categories[0].actions, config.case_categories[0].actions);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let loaded = ServerConfig::load(Some(Path::new("/nonexistent/relay.toml")));
        assert_eq!(loaded.bind, ServerConfig::default().bind);
    }
}
