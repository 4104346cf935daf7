use config::{Config as ConfigLoader, ConfigError, Environment, File};
use parley_llm::{OpenAIConfig, RetryPolicy};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::conversation::ConversationSettings;

/// Secrets that must be present in the environment
pub const REQUIRED_ENV_VARS: [&str; 5] = [
    "SLACK_BOT_TOKEN",
    "SLACK_SIGNING_SECRET",
    "SLACK_APP_TOKEN",
    "OPENAI_API_KEY",
    "MONGODB_URI",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub mongodb: MongoDbConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    // From ENV only
    #[serde(skip)]
    pub secrets: Secrets,
    /// Empty means every channel is served
    #[serde(skip)]
    pub allowed_channels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// OpenAI-compatible endpoint, defaults to api.openai.com
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoDbConfig {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Clone, Default)]
pub struct Secrets {
    pub slack_bot_token: String,
    /// Only needed for HTTP event delivery; Socket Mode does not verify signatures
    pub slack_signing_secret: String,
    pub slack_app_token: String,
    pub openai_api_key: String,
    pub mongodb_uri: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("slack_bot_token", &"<redacted>")
            .field("slack_signing_secret", &"<redacted>")
            .field("slack_app_token", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .field("mongodb_uri", &"<redacted>")
            .finish()
    }
}

fn default_model() -> String {
    "gpt-4.1".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    300
}
fn default_max_messages() -> usize {
    parley_persist::DEFAULT_MAX_MESSAGES
}
fn default_max_attempts() -> u32 {
    3
}
fn default_delay_ms() -> u64 {
    1000
}
fn default_database() -> String {
    "slack-gpt".to_string()
}
fn default_collection() -> String {
    "conversations".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl Default for MongoDbConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            collection: default_collection(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set, `dev` otherwise)
    /// 3. `PARLEY_<SECTION>__<KEY>` environment variables
    ///
    /// Secrets and the channel allow-list come from the plain environment
    /// afterwards (see [`Config::apply_env`]).
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            // 1. Load default config
            .add_source(File::with_name("config/default").required(false))
            // 2. Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // 3. Environment variables override everything
            .add_source(
                Environment::with_prefix("PARLEY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;
        cfg.apply_env(|key| std::env::var(key).ok())?;

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Fill secrets and environment-only settings through `lookup`
    ///
    /// Every missing or empty required variable is reported in one error.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let missing: Vec<&str> = REQUIRED_ENV_VARS
            .iter()
            .copied()
            .filter(|key| read(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Message(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let required = |key: &str| read(key).unwrap_or_default();
        self.secrets = Secrets {
            slack_bot_token: required("SLACK_BOT_TOKEN"),
            slack_signing_secret: required("SLACK_SIGNING_SECRET"),
            slack_app_token: required("SLACK_APP_TOKEN"),
            openai_api_key: required("OPENAI_API_KEY"),
            mongodb_uri: required("MONGODB_URI"),
        };

        if let Some(database) = read("MONGODB_DB_NAME") {
            self.mongodb.database = database;
        }

        self.allowed_channels = read("ALLOWED_CHANNELS")
            .map(|list| parse_channel_list(&list))
            .unwrap_or_default();

        Ok(())
    }

    pub fn openai_config(&self) -> OpenAIConfig {
        let mut config = OpenAIConfig::new(self.secrets.openai_api_key.clone())
            .with_timeout_secs(self.llm.timeout_secs);
        if let Some(base_url) = &self.llm.base_url {
            config = config.with_base_url(base_url.clone());
        }
        config
    }

    pub fn conversation_settings(&self) -> ConversationSettings {
        ConversationSettings {
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            max_history: self.history.max_messages,
            retry: RetryPolicy::fixed(
                self.retry.max_attempts,
                Duration::from_millis(self.retry.delay_ms),
            ),
        }
    }
}

/// Split a comma-separated channel list, dropping blanks
pub fn parse_channel_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|channel| !channel.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, String> {
        REQUIRED_ENV_VARS
            .iter()
            .map(|key| (*key, format!("{}-value", key.to_lowercase())))
            .collect()
    }

    #[test]
    fn test_config_structure() {
        let toml = r#"
            [llm]
            model = "gpt-4o"
            max_tokens = 1024
            temperature = 0.2

            [history]
            max_messages = 20

            [retry]
            max_attempts = 5
            delay_ms = 250

            [mongodb]
            database = "test"
            collection = "threads"

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.history.max_messages, 20);
        assert_eq!(config.mongodb.database, "test");
        assert_eq!(config.logging.format, "json");

        let settings = config.conversation_settings();
        assert_eq!(settings.max_tokens, 1024);
        assert_eq!(settings.retry, RetryPolicy::fixed(5, Duration::from_millis(250)));
    }

    #[test]
    fn test_defaults_without_any_file() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.llm.model, "gpt-4.1");
        assert_eq!(config.llm.max_tokens, 4096);
        assert!((config.llm.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.history.max_messages, 50);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay_ms, 1000);
        assert_eq!(config.mongodb.database, "slack-gpt");
        assert_eq!(config.mongodb.collection, "conversations");
    }

    #[test]
    fn test_apply_env_reports_all_missing() {
        let mut env = full_env();
        env.remove("SLACK_APP_TOKEN");
        env.insert("MONGODB_URI", "   ".to_string());

        let mut config = Config::default();
        let err = config
            .apply_env(|key| env.get(key).cloned())
            .unwrap_err()
            .to_string();

        assert!(err.contains("Missing required environment variables"));
        assert!(err.contains("SLACK_APP_TOKEN"));
        assert!(err.contains("MONGODB_URI"));
        assert!(!err.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_apply_env_fills_secrets_and_optionals() {
        let mut env = full_env();
        env.insert("MONGODB_DB_NAME", "custom-db".to_string());
        env.insert("ALLOWED_CHANNELS", "C1, C2,,".to_string());

        let mut config = Config::default();
        config.apply_env(|key| env.get(key).cloned()).unwrap();

        assert_eq!(config.secrets.slack_bot_token, "slack_bot_token-value");
        assert_eq!(config.secrets.mongodb_uri, "mongodb_uri-value");
        assert_eq!(config.mongodb.database, "custom-db");
        assert_eq!(config.allowed_channels, vec!["C1", "C2"]);
    }

    #[test]
    fn test_no_allow_list_means_empty() {
        let env = full_env();
        let mut config = Config::default();
        config.apply_env(|key| env.get(key).cloned()).unwrap();
        assert!(config.allowed_channels.is_empty());
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let secrets = Secrets {
            openai_api_key: "sk-very-secret".to_string(),
            ..Secrets::default()
        };
        let rendered = format!("{:?}", secrets);
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_openai_config_from_settings() {
        let mut config = Config::default();
        config.secrets.openai_api_key = "sk-test".to_string();
        config.llm.base_url = Some("http://localhost:9000/v1".to_string());

        let openai = config.openai_config();
        assert_eq!(openai.api_key, "sk-test");
        assert_eq!(openai.base_url.as_deref(), Some("http://localhost:9000/v1"));
        assert_eq!(openai.timeout_secs, Some(300));
    }
}
