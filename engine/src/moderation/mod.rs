//! Content moderation
//!
//! A keyword blocklist plus an optional remote classifier, applied to every
//! user string before it reaches a prompt.

use async_trait::async_trait;
use regex::Regex;
use sdk::errors::EngineError;
use serde_json::json;
use std::sync::Arc;

use crate::config::{ModerationConfig, OpenAIConfig};
use crate::llm::{self, ProviderError};
use crate::secrets::{self, CredentialStore};

/// A blocked term found in user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedMatch {
    /// The configured term that matched
    pub term: String,
    /// Byte offset of the match in the scanned text
    pub position: usize,
}

/// Whole-word, case-insensitive blocklist
///
/// ```
/// use uchronia_engine::moderation::KeywordFilter;
///
/// let filter = KeywordFilter::new(&["nerve agent".to_string()]).unwrap();
/// assert!(filter.scan("How was the NERVE AGENT made?").is_some());
/// assert!(filter.scan("A nervous agent of change").is_none());
/// ```
pub struct KeywordFilter {
    patterns: Vec<(String, Regex)>,
}

impl KeywordFilter {
    /// Compile one pattern per non-blank term
    pub fn new(terms: &[String]) -> Result<Self, regex::Error> {
        let mut patterns = Vec::with_capacity(terms.len());
        for term in terms {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term)))?;
            patterns.push((term.to_lowercase(), pattern));
        }
        Ok(Self { patterns })
    }

    pub fn scan(&self, text: &str) -> Option<BlockedMatch> {
        self.patterns.iter().find_map(|(term, pattern)| {
            pattern.find(text).map(|m| BlockedMatch {
                term: term.clone(),
                position: m.start(),
            })
        })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// External content classifier
#[async_trait]
pub trait ModerationService: Send + Sync {
    fn name(&self) -> &str;

    /// Returns true when the text should be rejected
    async fn is_flagged(&self, text: &str) -> llm::Result<bool>;
}

/// OpenAI moderation endpoint (`/moderations`)
pub struct OpenAIModeration {
    config: OpenAIConfig,
    credentials: CredentialStore,
    client: reqwest::Client,
}

impl OpenAIModeration {
    pub fn new(config: OpenAIConfig, credentials: CredentialStore) -> Self {
        Self {
            config,
            credentials,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModerationService for OpenAIModeration {
    fn name(&self) -> &str {
        "openai-moderation"
    }

    async fn is_flagged(&self, text: &str) -> llm::Result<bool> {
        let api_key = llm::credential(&self.credentials, "openai", &self.config.api_key_env)?;

        let url = format!("{}/moderations", self.config.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.config.moderation_model,
            "input": text,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.unsecure())
            .json(&payload)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let response = llm::ensure_success(response).await?;

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        data.get("results")
            .and_then(|r| r.as_array())
            .and_then(|r| r.first())
            .and_then(|result| result.get("flagged"))
            .and_then(|flagged| flagged.as_bool())
            .ok_or_else(|| ProviderError::InvalidResponse("No moderation result".to_string()))
    }
}

/// Screens user-supplied text before it reaches a provider.
///
/// The keyword blocklist always runs when moderation is enabled. The remote
/// service is optional; when it cannot be reached, `fail_open` decides
/// whether the request proceeds.
pub struct Moderator {
    enabled: bool,
    fail_open: bool,
    keywords: KeywordFilter,
    remote: Option<Arc<dyn ModerationService>>,
}

impl Moderator {
    pub fn new(
        config: &ModerationConfig,
        remote: Option<Arc<dyn ModerationService>>,
    ) -> Result<Self, EngineError> {
        let keywords = KeywordFilter::new(&config.blocked_terms)
            .map_err(|e| EngineError::Config(format!("Invalid blocked term: {}", e)))?;
        if config.enabled && keywords.is_empty() && remote.is_none() {
            tracing::warn!("Moderation is enabled with no blocked terms and no remote classifier");
        }
        Ok(Self {
            enabled: config.enabled,
            fail_open: config.fail_open,
            keywords,
            remote,
        })
    }

    /// Build from configuration, attaching OpenAI moderation when `remote` is set
    pub fn from_config(
        config: &ModerationConfig,
        openai: &OpenAIConfig,
        credentials: &CredentialStore,
    ) -> Result<Self, EngineError> {
        let remote: Option<Arc<dyn ModerationService>> = if config.remote {
            Some(Arc::new(OpenAIModeration::new(
                openai.clone(),
                credentials.clone(),
            )))
        } else {
            None
        };
        Self::new(config, remote)
    }

    /// A moderator that allows everything
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            fail_open: true,
            keywords: KeywordFilter {
                patterns: Vec::new(),
            },
            remote: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of active blocklist terms
    pub fn blocked_terms(&self) -> usize {
        self.keywords.len()
    }

    /// Check every field; the first blocked term rejects the request
    pub async fn check(&self, fields: &[&str]) -> Result<(), EngineError> {
        if !self.enabled {
            return Ok(());
        }

        for field in fields {
            if let Some(hit) = self.keywords.scan(field) {
                tracing::info!(term = %hit.term, position = hit.position, "Blocked term in request");
                return Err(EngineError::ModerationRejected(
                    "Request contains blocked content".to_string(),
                ));
            }
        }

        let Some(remote) = &self.remote else {
            return Ok(());
        };

        let text = fields
            .iter()
            .filter(|f| !f.trim().is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            return Ok(());
        }

        match remote.is_flagged(&text).await {
            Ok(false) => Ok(()),
            Ok(true) => {
                tracing::info!(service = remote.name(), "Request flagged by moderation");
                Err(EngineError::ModerationRejected(
                    "Request was flagged by content moderation".to_string(),
                ))
            }
            Err(e) if self.fail_open => {
                tracing::warn!(
                    service = remote.name(),
                    "Moderation unavailable, allowing request: {}",
                    e
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(service = remote.name(), "Moderation unavailable: {}", e);
                Err(EngineError::ModerationUnavailable(secrets::scrub_truncated(
                    &e.to_string(),
                    200,
                )))
            }
        }
    }
}
