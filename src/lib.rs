//! Taskboard core
//!
//! Multi-tenant task management backend:
//! - Environment-scoped access to lists, tasks, organizations
//! - Soft-delete trash lifecycle with a retention window
//! - Role-based permission evaluation
//! - Conversational assistant that turns chat into bulk task actions

pub mod api;
pub mod auth;
pub mod chat;
pub mod error;
pub mod permissions;
pub mod store;
pub mod tenant;
pub mod trash;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub store: StoreYamlConfig,
    pub model: ModelYamlConfig,
    pub chat: ChatYamlConfig,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self { port: 3001 }
    }
}

/// Persistence service section. An empty `url` selects the in-memory
/// backend (local mode, no external service).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoreYamlConfig {
    pub url: String,
    pub api_key: String,
}

/// Chat model section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelYamlConfig {
    pub url: String,
    pub api_key: String,
    pub name: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelYamlConfig {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            name: "gpt-3.5-turbo".into(),
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

/// Chat pipeline section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatYamlConfig {
    pub cooldown_secs: u64,
}

impl Default for ChatYamlConfig {
    fn default() -> Self {
        Self { cooldown_secs: 3 }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Which persistence backend a configuration selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Rest,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub store_url: String,
    pub store_api_key: String,
    pub model_url: String,
    pub model_api_key: String,
    pub model_name: String,
    pub model_temperature: f32,
    pub model_max_tokens: u32,
    pub chat_cooldown_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_yaml(YamlConfig::default())
    }
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);
        let base = Self::from_yaml(yaml);

        Ok(Self {
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.server_port),
            store_url: std::env::var("STORE_URL").unwrap_or(base.store_url),
            store_api_key: std::env::var("STORE_API_KEY").unwrap_or(base.store_api_key),
            model_url: std::env::var("MODEL_URL").unwrap_or(base.model_url),
            model_api_key: std::env::var("OPENAI_API_KEY").unwrap_or(base.model_api_key),
            model_name: std::env::var("MODEL_NAME").unwrap_or(base.model_name),
            model_temperature: base.model_temperature,
            model_max_tokens: base.model_max_tokens,
            chat_cooldown_secs: std::env::var("CHAT_COOLDOWN_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.chat_cooldown_secs),
        })
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        Self {
            server_port: yaml.server.port,
            store_url: yaml.store.url,
            store_api_key: yaml.store.api_key,
            model_url: yaml.model.url,
            model_api_key: yaml.model.api_key,
            model_name: yaml.model.name,
            model_temperature: yaml.model.temperature,
            model_max_tokens: yaml.model.max_tokens,
            chat_cooldown_secs: yaml.chat.cooldown_secs,
        }
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }

    pub fn store_backend(&self) -> StoreBackend {
        if self.store_url.is_empty() {
            StoreBackend::Memory
        } else {
            StoreBackend::Rest
        }
    }
}

// ============================================================================
// Shared application state
// ============================================================================

pub struct AppState {
    pub store: Arc<dyn store::traits::EntityStore>,
    pub pipeline: chat::ChatPipeline,
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state with all services initialized.
    ///
    /// Local mode (empty store url) runs on the in-memory store with no
    /// identity provider; every chat caller is anonymous.
    pub async fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn store::traits::EntityStore> = match config.store_backend() {
            StoreBackend::Rest => Arc::new(store::rest::RestStore::new(
                &config.store_url,
                &config.store_api_key,
            )),
            StoreBackend::Memory => Arc::new(store::memory::MemoryStore::new()),
        };

        let identity: Arc<dyn auth::IdentityProvider> = match config.store_backend() {
            StoreBackend::Rest => Arc::new(auth::RestIdentity::new(
                &config.store_url,
                &config.store_api_key,
            )),
            StoreBackend::Memory => Arc::new(auth::MockIdentity::new()),
        };

        let model = Arc::new(chat::OpenAiClient::new(
            &config.model_url,
            &config.model_api_key,
            &config.model_name,
            config.model_temperature,
            config.model_max_tokens,
        ));

        let pipeline = chat::ChatPipeline::new(
            store.clone(),
            model,
            identity,
            chat::RateLimiter::new(Duration::from_secs(config.chat_cooldown_secs)),
        );

        Ok(Self {
            store,
            pipeline,
            config: Arc::new(config),
        })
    }

    /// State on all-mock backends: memory store, canned off-protocol model
    /// reply, no resolvable tokens.
    #[cfg(test)]
    pub(crate) async fn for_tests(config: Config) -> Self {
        let store: Arc<dyn store::traits::EntityStore> = Arc::new(store::memory::MemoryStore::new());
        let pipeline = chat::ChatPipeline::new(
            store.clone(),
            Arc::new(chat::MockModel::new("ok")),
            Arc::new(auth::MockIdentity::new()),
            chat::RateLimiter::new(Duration::from_secs(config.chat_cooldown_secs)),
        );
        Self {
            store,
            pipeline,
            config: Arc::new(config),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_config_loading() {
        let yaml = r#"
server:
  port: 9090

store:
  url: https://project.supabase.co
  api_key: anon-key

model:
  api_key: sk-test
  name: gpt-4o-mini
  temperature: 0.2

chat:
  cooldown_secs: 10
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.store.url, "https://project.supabase.co");
        assert_eq!(config.store.api_key, "anon-key");
        assert_eq!(config.model.name, "gpt-4o-mini");
        assert_eq!(config.model.temperature, 0.2);
        // Unset model fields keep their defaults
        assert_eq!(config.model.url, "https://api.openai.com/v1");
        assert_eq!(config.model.max_tokens, 500);
        assert_eq!(config.chat.cooldown_secs, 10);
    }

    #[test]
    fn test_yaml_defaults() {
        let config = YamlConfig::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.store.url, "");
        assert_eq!(config.model.name, "gpt-3.5-turbo");
        assert_eq!(config.model.temperature, 0.7);
        assert_eq!(config.model.max_tokens, 500);
        assert_eq!(config.chat.cooldown_secs, 3);
    }

    #[test]
    fn test_backend_selection() {
        let mut config = Config::default();
        assert_eq!(config.store_backend(), StoreBackend::Memory);
        config.store_url = "https://project.supabase.co".into();
        assert_eq!(config.store_backend(), StoreBackend::Rest);
    }

    /// Combined test for YAML file loading, env var overrides, and defaults.
    /// Runs as a single test to avoid parallel env var race conditions.
    #[test]
    fn test_yaml_and_env_lifecycle() {
        fn clear_env() {
            for var in &[
                "SERVER_PORT",
                "STORE_URL",
                "STORE_API_KEY",
                "MODEL_URL",
                "OPENAI_API_KEY",
                "MODEL_NAME",
                "CHAT_COOLDOWN_SECS",
            ] {
                std::env::remove_var(var);
            }
        }

        // --- Phase 1: YAML values loaded correctly ---
        let yaml = r#"
server:
  port: 9999
store:
  url: https://yaml-host.supabase.co
  api_key: yaml-key
model:
  api_key: sk-yaml
"#;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        clear_env();

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.server_port, 9999);
        assert_eq!(config.store_url, "https://yaml-host.supabase.co");
        assert_eq!(config.store_api_key, "yaml-key");
        assert_eq!(config.model_api_key, "sk-yaml");

        // --- Phase 2: Env vars override YAML ---
        std::env::set_var("STORE_URL", "https://env-host.supabase.co");
        std::env::set_var("SERVER_PORT", "7777");

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.store_url, "https://env-host.supabase.co");
        assert_eq!(config.server_port, 7777);
        // YAML value still used where no env override
        assert_eq!(config.store_api_key, "yaml-key");

        clear_env();

        // --- Phase 3: No YAML file → defaults ---
        let nonexistent = Path::new("/tmp/nonexistent-config-12345.yaml");
        let config = Config::from_yaml_and_env(Some(nonexistent)).unwrap();
        assert_eq!(config.server_port, 3001);
        assert_eq!(config.store_url, "");
        assert_eq!(config.store_backend(), StoreBackend::Memory);
    }
}
