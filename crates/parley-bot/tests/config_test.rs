use std::collections::HashMap;
use std::path::PathBuf;

use parley_bot::config::{Config, REQUIRED_ENV_VARS};

fn shipped_default() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml")
}

#[test]
fn test_shipped_default_config_matches_built_in_defaults() {
    let from_file = Config::from_file(shipped_default()).unwrap();
    let built_in = Config::default();

    assert_eq!(from_file.llm.model, built_in.llm.model);
    assert_eq!(from_file.llm.max_tokens, built_in.llm.max_tokens);
    assert_eq!(from_file.llm.timeout_secs, built_in.llm.timeout_secs);
    assert_eq!(from_file.history.max_messages, built_in.history.max_messages);
    assert_eq!(from_file.retry.max_attempts, built_in.retry.max_attempts);
    assert_eq!(from_file.retry.delay_ms, built_in.retry.delay_ms);
    assert_eq!(from_file.mongodb.database, built_in.mongodb.database);
    assert_eq!(from_file.mongodb.collection, built_in.mongodb.collection);
    assert_eq!(from_file.logging.level, "info");
    assert!(from_file.llm.base_url.is_none());
}

#[test]
fn test_environment_completes_a_file_config() {
    let mut config = Config::from_file(shipped_default()).unwrap();
    let mut env: HashMap<&str, &str> = REQUIRED_ENV_VARS.iter().map(|key| (*key, "set")).collect();
    env.insert("MONGODB_DB_NAME", "override-db");
    env.insert("ALLOWED_CHANNELS", "C1, ,C2");

    config
        .apply_env(|key| env.get(key).map(|value| value.to_string()))
        .unwrap();

    assert_eq!(config.mongodb.database, "override-db");
    assert_eq!(config.allowed_channels, vec!["C1", "C2"]);
    assert_eq!(config.secrets.mongodb_uri, "set");
}

#[test]
fn test_missing_secrets_fail_startup() {
    let mut config = Config::default();
    let err = config
        .apply_env(|key| (key == "SLACK_BOT_TOKEN").then(|| "xoxb".to_string()))
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("Missing required environment variables"));
    assert!(message.contains("SLACK_APP_TOKEN"));
    assert!(message.contains("MONGODB_URI"));
    assert!(!message.contains("SLACK_BOT_TOKEN"));
}
