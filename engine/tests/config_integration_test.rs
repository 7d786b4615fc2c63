//! Integration tests for configuration management
//!
//! These tests write real TOML files to a temporary directory and load them
//! through the public API.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

use sdk::errors::EngineError;
use uchronia_engine::cache::CacheNamespace;
use uchronia_engine::config::Config;

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_config_toml_parsing() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[core]
log_level = "debug"

[server]
host = "0.0.0.0"
port = 8080

[limits]
max_subject_chars = 80
max_depth = 3
rate_limit_per_minute = 0

[cache]
simulation_ttl_secs = 60

[moderation]
fail_open = false
blocked_terms = ["forbidden thing"]

[providers]
text = ["groq", "openai"]
image = ["stability"]
timeout_secs = 15

[providers.groq]
chat_model = "llama-test"

[providers.stability]
engine = "sdxl-test"
"#,
    );

    let config = Config::load_from_path(&path).unwrap();

    assert_eq!(config.core.log_level, "debug");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.limits.max_subject_chars, 80);
    assert_eq!(config.limits.max_depth, 3);
    assert_eq!(config.limits.rate_limit_per_minute, 0);
    assert_eq!(
        config.cache.ttl(CacheNamespace::Simulation),
        Duration::from_secs(60)
    );
    assert!(!config.moderation.fail_open);
    assert_eq!(config.moderation.blocked_terms, vec!["forbidden thing"]);
    assert_eq!(config.providers.text, vec!["groq", "openai"]);
    assert_eq!(config.providers.image, vec!["stability"]);
    assert_eq!(
        config.providers.attempt_timeout(),
        Some(Duration::from_secs(15))
    );
    assert_eq!(config.providers.groq.chat_model, "llama-test");
    assert_eq!(config.providers.stability.engine, "sdxl-test");
}

#[test]
fn test_partial_config_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[core]\nlog_level = \"warn\"\n");

    let config = Config::load_from_path(&path).unwrap();
    let defaults = Config::default();

    assert_eq!(config.core.log_level, "warn");
    assert_eq!(config.server.port, defaults.server.port);
    assert_eq!(config.limits.max_subject_chars, 100);
    assert_eq!(config.providers.text, defaults.providers.text);
    assert_eq!(config.providers.transcription, vec!["openai", "groq"]);
    assert!(config.moderation.enabled);
    assert!(!config.moderation.blocked_terms.is_empty());
}

#[test]
fn test_empty_file_is_default_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.core.log_level, "info");
    assert_eq!(config.cache.sweep_interval_secs, 300);
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = Config::load(Some(&missing)).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_malformed_toml_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[server\nport = 80");

    let err = Config::load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config"));
}

#[test]
fn test_unknown_provider_is_rejected() {
    let err = Config::from_toml_str("[providers]\nimage = [\"anthropic\"]\n").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Unknown image provider 'anthropic'"));
    assert!(message.contains("openai, stability"));
}

#[test]
fn test_duplicate_provider_is_rejected() {
    let err = Config::from_toml_str("[providers]\ntext = [\"openai\", \"openai\"]\n").unwrap_err();
    assert!(err.to_string().contains("Duplicate text provider 'openai'"));
}

#[test]
fn test_invalid_log_level_is_rejected() {
    let err = Config::from_toml_str("[core]\nlog_level = \"loud\"\n").unwrap_err();
    assert!(err.to_string().contains("Invalid log level 'loud'"));
}

#[test]
fn test_zero_limits_are_rejected() {
    assert!(Config::from_toml_str("[limits]\nmax_depth = 0\n").is_err());
    assert!(Config::from_toml_str("[limits]\nmax_era_chars = 0\n").is_err());
    assert!(Config::from_toml_str("[cache]\nimage_ttl_secs = 0\n").is_err());
    assert!(Config::from_toml_str("[cache]\nsweep_interval_secs = 0\n").is_err());
}

#[test]
fn test_empty_provider_list_is_allowed() {
    let config = Config::from_toml_str("[providers]\ntranscription = []\n").unwrap();
    assert!(config.providers.transcription.is_empty());
}
