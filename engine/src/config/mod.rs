//! Configuration management
//!
//! This module handles loading, validation, and management of the Uchronia
//! configuration. Configuration is stored in TOML format, by default at
//! ~/.uchronia/config.toml. Every section is optional; anything left out falls
//! back to the built-in defaults, so the server runs with no file at all.
//!
//! # Configuration Sections
//!
//! - **core**: Log level
//! - **server**: Listen address
//! - **limits**: Input bounds and rate limiting
//! - **cache**: Per-namespace TTLs and the sweep interval
//! - **moderation**: Keyword blocklist, remote check, fail-open policy
//! - **providers**: Ordered provider lists per operation and backend settings
//!
//! API keys never live in this file. Each backend names the environment
//! variable that holds its key (`api_key_env`).
//!
//! # Examples
//!
//! ```no_run
//! use uchronia_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! println!("Listening on {}:{}", config.server.host, config.server.port);
//! println!("Text providers: {:?}", config.providers.text);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheNamespace;

/// Provider names accepted in `providers.text`
pub const TEXT_PROVIDERS: &[&str] = &["openai", "anthropic", "gemini", "groq"];

/// Provider names accepted in `providers.image`
pub const IMAGE_PROVIDERS: &[&str] = &["openai", "stability"];

/// Provider names accepted in `providers.transcription`
pub const TRANSCRIPTION_PROVIDERS: &[&str] = &["openai", "groq"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Input bounds and rate limiting
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Cache TTLs
    #[serde(default)]
    pub cache: CacheConfig,

    /// Moderation policy
    #[serde(default)]
    pub moderation: ModerationConfig,

    /// Provider ordering and backend settings
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Input bounds enforced before any cache or provider interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum characters in an invention name
    #[serde(default = "default_max_subject_chars")]
    pub max_subject_chars: usize,

    /// Maximum characters in an era description
    #[serde(default = "default_max_era_chars")]
    pub max_era_chars: usize,

    /// Maximum characters in a free-form image prompt
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Maximum characters in an image style
    #[serde(default = "default_max_style_chars")]
    pub max_style_chars: usize,

    /// Maximum number of pathways a simulation may request
    #[serde(default = "default_max_depth")]
    pub max_depth: u8,

    /// Maximum upload size for transcription
    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: usize,

    /// Maximum total characters in an attached pathway or decomposition
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Generation requests allowed per client per minute (0 disables)
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: usize,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_decomposition_ttl")]
    pub decomposition_ttl_secs: u64,

    #[serde(default = "default_simulation_ttl")]
    pub simulation_ttl_secs: u64,

    #[serde(default = "default_image_ttl")]
    pub image_ttl_secs: u64,

    #[serde(default = "default_transcription_ttl")]
    pub transcription_ttl_secs: u64,

    /// How often the background sweep purges expired entries
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl CacheConfig {
    /// TTL for a cache namespace
    pub fn ttl(&self, namespace: CacheNamespace) -> Duration {
        let secs = match namespace {
            CacheNamespace::Decomposition => self.decomposition_ttl_secs,
            CacheNamespace::Simulation => self.simulation_ttl_secs,
            CacheNamespace::Image => self.image_ttl_secs,
            CacheNamespace::Transcription => self.transcription_ttl_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Moderation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Enable moderation checks
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Allow requests through when the remote moderation service fails
    #[serde(default = "default_true")]
    pub fail_open: bool,

    /// Also ask the OpenAI moderation endpoint
    #[serde(default)]
    pub remote: bool,

    /// Terms that reject a request outright (case-insensitive, whole words)
    #[serde(default = "default_blocked_terms")]
    pub blocked_terms: Vec<String>,
}

/// Provider ordering and backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Chat providers in priority order
    #[serde(default = "default_text_providers")]
    pub text: Vec<String>,

    /// Image providers in priority order
    #[serde(default = "default_image_providers")]
    pub image: Vec<String>,

    /// Transcription providers in priority order
    #[serde(default = "default_transcription_providers")]
    pub transcription: Vec<String>,

    /// Per-attempt timeout in seconds (0 leaves it to the HTTP client)
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub openai: OpenAIConfig,

    #[serde(default)]
    pub anthropic: AnthropicConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub stability: StabilityConfig,

    #[serde(default)]
    pub groq: GroqConfig,
}

impl ProvidersConfig {
    /// Per-attempt timeout, if one is configured
    pub fn attempt_timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// OpenAI backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_openai_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_openai_image_model")]
    pub image_model: String,

    #[serde(default = "default_openai_transcription_model")]
    pub transcription_model: String,

    #[serde(default = "default_openai_moderation_model")]
    pub moderation_model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
}

/// Anthropic backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,

    #[serde(default = "default_anthropic_model")]
    pub model: String,

    #[serde(default = "default_anthropic_key_env")]
    pub api_key_env: String,
}

/// Gemini backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,
}

/// Stability AI backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityConfig {
    #[serde(default = "default_stability_base_url")]
    pub base_url: String,

    /// Engine id used in the text-to-image path
    #[serde(default = "default_stability_engine")]
    pub engine: String,

    #[serde(default = "default_stability_key_env")]
    pub api_key_env: String,
}

/// Groq backend configuration (OpenAI-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    #[serde(default = "default_groq_base_url")]
    pub base_url: String,

    #[serde(default = "default_groq_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_groq_transcription_model")]
    pub transcription_model: String,

    #[serde(default = "default_groq_key_env")]
    pub api_key_env: String,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_max_subject_chars() -> usize {
    100
}

fn default_max_era_chars() -> usize {
    60
}

fn default_max_prompt_chars() -> usize {
    1000
}

fn default_max_style_chars() -> usize {
    60
}

fn default_max_depth() -> u8 {
    5
}

fn default_max_audio_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_max_context_chars() -> usize {
    8000
}

fn default_rate_limit_per_minute() -> usize {
    30
}

fn default_decomposition_ttl() -> u64 {
    3600
}

fn default_simulation_ttl() -> u64 {
    1800
}

fn default_image_ttl() -> u64 {
    7200
}

fn default_transcription_ttl() -> u64 {
    600
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_blocked_terms() -> Vec<String> {
    [
        "bioweapon",
        "chemical weapon",
        "nerve agent",
        "nuclear bomb",
        "dirty bomb",
        "genocide",
        "ethnic cleansing",
        "terrorist attack",
        "child abuse",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_text_providers() -> Vec<String> {
    vec![
        "openai".to_string(),
        "anthropic".to_string(),
        "gemini".to_string(),
    ]
}

fn default_image_providers() -> Vec<String> {
    vec!["openai".to_string(), "stability".to_string()]
}

fn default_transcription_providers() -> Vec<String> {
    vec!["openai".to_string(), "groq".to_string()]
}

fn default_provider_timeout() -> u64 {
    60
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_openai_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_openai_moderation_model() -> String {
    "omni-moderation-latest".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_anthropic_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_stability_base_url() -> String {
    "https://api.stability.ai/v1".to_string()
}

fn default_stability_engine() -> String {
    "stable-diffusion-xl-1024-v1-0".to_string()
}

fn default_stability_key_env() -> String {
    "STABILITY_API_KEY".to_string()
}

fn default_groq_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_groq_chat_model() -> String {
    "llama-3.1-70b-versatile".to_string()
}

fn default_groq_transcription_model() -> String {
    "whisper-large-v3".to_string()
}

fn default_groq_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_subject_chars: default_max_subject_chars(),
            max_era_chars: default_max_era_chars(),
            max_prompt_chars: default_max_prompt_chars(),
            max_style_chars: default_max_style_chars(),
            max_depth: default_max_depth(),
            max_audio_bytes: default_max_audio_bytes(),
            max_context_chars: default_max_context_chars(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            decomposition_ttl_secs: default_decomposition_ttl(),
            simulation_ttl_secs: default_simulation_ttl(),
            image_ttl_secs: default_image_ttl(),
            transcription_ttl_secs: default_transcription_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fail_open: true,
            remote: false,
            blocked_terms: default_blocked_terms(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            text: default_text_providers(),
            image: default_image_providers(),
            transcription: default_transcription_providers(),
            timeout_secs: default_provider_timeout(),
            openai: OpenAIConfig::default(),
            anthropic: AnthropicConfig::default(),
            gemini: GeminiConfig::default(),
            stability: StabilityConfig::default(),
            groq: GroqConfig::default(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            chat_model: default_openai_chat_model(),
            image_model: default_openai_image_model(),
            transcription_model: default_openai_transcription_model(),
            moderation_model: default_openai_moderation_model(),
            api_key_env: default_openai_key_env(),
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_base_url(),
            model: default_anthropic_model(),
            api_key_env: default_anthropic_key_env(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
            api_key_env: default_gemini_key_env(),
        }
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            base_url: default_stability_base_url(),
            engine: default_stability_engine(),
            api_key_env: default_stability_key_env(),
        }
    }
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            base_url: default_groq_base_url(),
            chat_model: default_groq_chat_model(),
            transcription_model: default_groq_transcription_model(),
            api_key_env: default_groq_key_env(),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// With an explicit path the file must exist. Without one, the default
    /// location is used when present and the built-in defaults otherwise.
    /// Environment overrides are applied last, then the result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - An explicit configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let mut config = match path {
            Some(path) => Self::parse_file(path)?,
            None => {
                let default_path = Self::default_config_path()?;
                if default_path.exists() {
                    Self::parse_file(&default_path)?
                } else {
                    tracing::debug!(
                        "No config file at {}, using defaults",
                        default_path.display()
                    );
                    Self::default()
                }
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let config = Self::parse_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string and validate it
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default configuration file path (~/.uchronia/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".uchronia").join("config.toml"))
    }

    /// Apply `UCHRONIA_HOST`, `UCHRONIA_PORT`, and `PORT` overrides.
    ///
    /// `UCHRONIA_PORT` wins over `PORT`. Unparseable values are ignored with a
    /// warning.
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("UCHRONIA_HOST") {
            if !host.trim().is_empty() {
                self.server.host = host.trim().to_string();
            }
        }

        let port = std::env::var("UCHRONIA_PORT").or_else(|_| std::env::var("PORT"));
        if let Ok(port) = port {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid port override '{}'", port),
            }
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The log level is unknown
    /// - A provider list names an unknown provider or repeats one
    /// - A limit or TTL is zero
    pub fn validate(&self) -> Result<(), EngineError> {
        // Validate log level
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        // Validate provider lists
        validate_provider_list("text", &self.providers.text, TEXT_PROVIDERS)?;
        validate_provider_list("image", &self.providers.image, IMAGE_PROVIDERS)?;
        validate_provider_list(
            "transcription",
            &self.providers.transcription,
            TRANSCRIPTION_PROVIDERS,
        )?;

        // Validate limits
        let limits = &self.limits;
        if limits.max_subject_chars == 0
            || limits.max_era_chars == 0
            || limits.max_prompt_chars == 0
            || limits.max_style_chars == 0
            || limits.max_context_chars == 0
        {
            return Err(EngineError::Config(
                "limits.max_*_chars must be greater than 0".to_string(),
            ));
        }
        if limits.max_depth == 0 {
            return Err(EngineError::Config(
                "limits.max_depth must be at least 1".to_string(),
            ));
        }
        if limits.max_audio_bytes == 0 {
            return Err(EngineError::Config(
                "limits.max_audio_bytes must be greater than 0".to_string(),
            ));
        }

        // Validate cache TTLs
        for namespace in CacheNamespace::ALL {
            if self.cache.ttl(namespace).is_zero() {
                return Err(EngineError::Config(format!(
                    "cache TTL for {} must be greater than 0",
                    namespace
                )));
            }
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(EngineError::Config(
                "cache.sweep_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_provider_list(
    operation: &str,
    names: &[String],
    known: &[&str],
) -> Result<(), EngineError> {
    for (i, name) in names.iter().enumerate() {
        if !known.contains(&name.as_str()) {
            return Err(EngineError::Config(format!(
                "Unknown {} provider '{}'. Must be one of: {}",
                operation,
                name,
                known.join(", ")
            )));
        }
        if names[..i].contains(name) {
            return Err(EngineError::Config(format!(
                "Duplicate {} provider '{}'",
                operation, name
            )));
        }
    }
    Ok(())
}
