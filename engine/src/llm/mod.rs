//! Provider Abstraction Layer
//!
//! This module provides a common interface for the external AI backends
//! (OpenAI, Anthropic, Gemini, Groq, Stability AI). Every adapter implements
//! [`Provider`] for one request type, so the [`router::FallbackRouter`] can try
//! chat, image, and transcription backends the same way.
//!
//! Adapters never retry. A missing credential, a rejected call, a network
//! failure, and a malformed response are reported as distinct
//! [`ProviderError`] variants and the router moves on to the next provider.

use async_trait::async_trait;
use sdk::types::GeneratedImage;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::ProvidersConfig;
use crate::prompts::PromptPair;
use crate::secrets::{self, CredentialStore};

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod openai_images;
pub mod router;
pub mod stability;
pub mod whisper;

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Longest upstream body excerpt kept in an error
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Errors that can occur during provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The adapter has no credential; nothing was sent
    #[error("Provider not configured: {0}")]
    Configuration(String),

    /// The backend answered with a non-success status
    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Timeout, DNS failure, connection reset
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered 2xx but the envelope was unusable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No providers configured for {0}")]
    NoProviders(String),

    /// Every provider in the list failed; `last` is the final failure
    #[error("All {operation} providers failed; last error: {last}")]
    AllProvidersFailed {
        operation: String,
        attempted: Vec<String>,
        last: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Build an upstream error from a status and response body
    pub fn upstream(status: u16, body: &str) -> Self {
        Self::Upstream {
            status,
            message: secrets::scrub_truncated(body.trim(), MAX_ERROR_BODY_CHARS),
        }
    }

    /// Classify a reqwest failure
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        let message = secrets::scrub(&error.to_string());
        if error.is_decode() {
            Self::InvalidResponse(message)
        } else if let Some(status) = error.status() {
            Self::Upstream {
                status: status.as_u16(),
                message,
            }
        } else {
            Self::Transport(message)
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// The innermost error for aggregated failures
    pub fn last_error(&self) -> &ProviderError {
        match self {
            Self::AllProvidersFailed { last, .. } => last.last_error(),
            other => other,
        }
    }
}

/// Generic provider capability
///
/// `Req` is the operation's request type; `Output` is what a successful call
/// produces before coercion.
#[async_trait]
pub trait Provider<Req>: Send + Sync {
    type Output: Send;

    /// Returns the name of the provider (e.g., "openai", "anthropic")
    fn name(&self) -> &str;

    /// Perform one call against the backend
    async fn invoke(&self, request: &Req) -> Result<Self::Output>;

    /// Returns true when the provider's credential is present.
    /// This never contacts the backend.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Chat completion request: one system instruction and one user instruction
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,

    /// Ask the backend for a JSON object when it supports it
    pub json: bool,
}

impl ChatRequest {
    pub fn new(prompt: PromptPair) -> Self {
        Self {
            system: prompt.system,
            user: prompt.user,
            temperature: 0.7,
            max_tokens: 2048,
            json: false,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Output image dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageSize {
    #[default]
    Square,
    Landscape,
    Portrait,
}

impl ImageSize {
    /// Size string in the OpenAI images format
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Square => "1024x1024",
            ImageSize::Landscape => "1792x1024",
            ImageSize::Portrait => "1024x1792",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1024x1024" | "square" => Ok(ImageSize::Square),
            "1792x1024" | "landscape" => Ok(ImageSize::Landscape),
            "1024x1792" | "portrait" => Ok(ImageSize::Portrait),
            other => Err(format!(
                "Unsupported image size '{}'. Use 1024x1024, 1792x1024 or 1024x1792",
                other
            )),
        }
    }
}

/// Image generation request
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub size: ImageSize,
}

/// Uploaded audio to transcribe
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
}

pub type ChatProvider = dyn Provider<ChatRequest, Output = String>;
pub type ImageProvider = dyn Provider<ImageRequest, Output = Vec<GeneratedImage>>;
pub type TranscriptionProvider = dyn Provider<AudioClip, Output = String>;

/// Returns the response when its status is 2xx, otherwise an upstream error
/// carrying the status and a scrubbed excerpt of the body.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::upstream(status.as_u16(), &body))
}

/// Look up an adapter's credential, mapping absence to a configuration error
pub(crate) fn credential(
    credentials: &CredentialStore,
    provider: &str,
    env_name: &str,
) -> Result<secrets::SecretString> {
    credentials
        .get_secret(env_name)
        .map_err(|_| ProviderError::Configuration(format!("{} requires {}", provider, env_name)))
}

/// Build the chat providers named in `providers.text`, in order
pub fn build_chat_providers(
    config: &ProvidersConfig,
    credentials: &CredentialStore,
) -> Vec<Arc<ChatProvider>> {
    config
        .text
        .iter()
        .filter_map(|name| -> Option<Arc<ChatProvider>> {
            match name.as_str() {
                "openai" => Some(Arc::new(openai::OpenAIProvider::openai(
                    &config.openai,
                    credentials.clone(),
                ))),
                "groq" => Some(Arc::new(openai::OpenAIProvider::groq(
                    &config.groq,
                    credentials.clone(),
                ))),
                "anthropic" => Some(Arc::new(anthropic::AnthropicProvider::new(
                    config.anthropic.clone(),
                    credentials.clone(),
                ))),
                "gemini" => Some(Arc::new(gemini::GeminiProvider::new(
                    config.gemini.clone(),
                    credentials.clone(),
                ))),
                other => {
                    tracing::warn!("Skipping unknown text provider '{}'", other);
                    None
                }
            }
        })
        .collect()
}

/// Build the image providers named in `providers.image`, in order
pub fn build_image_providers(
    config: &ProvidersConfig,
    credentials: &CredentialStore,
) -> Vec<Arc<ImageProvider>> {
    config
        .image
        .iter()
        .filter_map(|name| -> Option<Arc<ImageProvider>> {
            match name.as_str() {
                "openai" => Some(Arc::new(openai_images::OpenAIImageProvider::new(
                    config.openai.clone(),
                    credentials.clone(),
                ))),
                "stability" => Some(Arc::new(stability::StabilityProvider::new(
                    config.stability.clone(),
                    credentials.clone(),
                ))),
                other => {
                    tracing::warn!("Skipping unknown image provider '{}'", other);
                    None
                }
            }
        })
        .collect()
}

/// Build the transcription providers named in `providers.transcription`, in order
pub fn build_transcription_providers(
    config: &ProvidersConfig,
    credentials: &CredentialStore,
) -> Vec<Arc<TranscriptionProvider>> {
    config
        .transcription
        .iter()
        .filter_map(|name| -> Option<Arc<TranscriptionProvider>> {
            match name.as_str() {
                "openai" => Some(Arc::new(whisper::WhisperProvider::openai(
                    &config.openai,
                    credentials.clone(),
                ))),
                "groq" => Some(Arc::new(whisper::WhisperProvider::groq(
                    &config.groq,
                    credentials.clone(),
                ))),
                other => {
                    tracing::warn!("Skipping unknown transcription provider '{}'", other);
                    None
                }
            }
        })
        .collect()
}
