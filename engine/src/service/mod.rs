//! Generation Service
//!
//! Runs every AI operation through the same pipeline:
//!
//! validate → moderate → cache lookup → prompt → fallback router → coerce →
//! cache store
//!
//! Cache hits return with `cached: true` and never touch a provider. Results
//! that fell back to placeholder content are returned but not cached, so the
//! next request gets a fresh attempt.

pub mod requests;

use sdk::errors::EngineError;
use sdk::types::{Decomposition, GeneratedImage, Simulation};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheKey, CacheNamespace, GenerationCache};
use crate::coercion::{self, Coerced};
use crate::config::{Config, LimitsConfig, ProvidersConfig};
use crate::llm::router::FallbackRouter;
use crate::llm::{
    self, AudioClip, ChatProvider, ChatRequest, ImageProvider, ImageRequest, ProviderError,
    TranscriptionProvider,
};
use crate::moderation::Moderator;
use crate::prompts;
use crate::secrets::{self, CredentialStore};

pub use requests::{
    DeconstructRequest, ImageGenerationRequest, NarrativeRequest, SimulateRequest,
};

/// Longest provider diagnostic returned to a client
const MAX_DETAIL_CHARS: usize = 300;

/// An operation result and whether it came from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct Generated<T> {
    pub value: T,
    pub cached: bool,
}

impl<T> Generated<T> {
    fn fresh(value: T) -> Self {
        Self {
            value,
            cached: false,
        }
    }

    fn cached(value: T) -> Self {
        Self {
            value,
            cached: true,
        }
    }
}

/// A provider's name and credential presence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderState {
    pub name: String,
    pub configured: bool,
}

/// Providers per operation kind, in trial order
#[derive(Debug, Clone, Serialize)]
pub struct ProviderReport {
    pub text: Vec<ProviderState>,
    pub image: Vec<ProviderState>,
    pub transcription: Vec<ProviderState>,
}

/// One router per provider kind
pub struct Providers {
    text: FallbackRouter<ChatRequest, String>,
    image: FallbackRouter<ImageRequest, Vec<GeneratedImage>>,
    transcription: FallbackRouter<AudioClip, String>,
}

impl Providers {
    pub fn new(
        text: Vec<Arc<ChatProvider>>,
        image: Vec<Arc<ImageProvider>>,
        transcription: Vec<Arc<TranscriptionProvider>>,
    ) -> Self {
        Self {
            text: FallbackRouter::new("text", text),
            image: FallbackRouter::new("image", image),
            transcription: FallbackRouter::new("transcription", transcription),
        }
    }

    /// Build adapters for the configured provider lists
    pub fn from_config(config: &ProvidersConfig, credentials: &CredentialStore) -> Self {
        Self::new(
            llm::build_chat_providers(config, credentials),
            llm::build_image_providers(config, credentials),
            llm::build_transcription_providers(config, credentials),
        )
        .with_timeout(config.attempt_timeout())
    }

    /// Apply a per-attempt timeout to every router
    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        Self {
            text: self.text.with_timeout(timeout),
            image: self.image.with_timeout(timeout),
            transcription: self.transcription.with_timeout(timeout),
        }
    }

    pub fn report(&self) -> ProviderReport {
        fn states(status: Vec<(String, bool)>) -> Vec<ProviderState> {
            status
                .into_iter()
                .map(|(name, configured)| ProviderState { name, configured })
                .collect()
        }
        ProviderReport {
            text: states(self.text.provider_status()),
            image: states(self.image.provider_status()),
            transcription: states(self.transcription.provider_status()),
        }
    }
}

/// Orchestrates validation, moderation, caching and provider calls
pub struct GenerationService {
    limits: LimitsConfig,
    cache: Arc<GenerationCache>,
    moderator: Moderator,
    providers: Providers,
}

impl GenerationService {
    pub fn new(
        limits: LimitsConfig,
        cache: Arc<GenerationCache>,
        moderator: Moderator,
        providers: Providers,
    ) -> Self {
        Self {
            limits,
            cache,
            moderator,
            providers,
        }
    }

    /// Build the service and its collaborators from configuration
    pub fn from_config(config: &Config, credentials: CredentialStore) -> Result<Self, EngineError> {
        let moderator =
            Moderator::from_config(&config.moderation, &config.providers.openai, &credentials)?;
        if moderator.is_enabled() {
            tracing::info!(blocked_terms = moderator.blocked_terms(), "Content moderation enabled");
        } else {
            tracing::warn!("Content moderation is disabled");
        }
        Ok(Self::new(
            config.limits.clone(),
            Arc::new(GenerationCache::new(&config.cache)),
            moderator,
            Providers::from_config(&config.providers, &credentials),
        ))
    }

    pub fn cache(&self) -> &Arc<GenerationCache> {
        &self.cache
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    pub fn provider_report(&self) -> ProviderReport {
        self.providers.report()
    }

    /// Break an invention into principles, components and prerequisites
    pub async fn deconstruct(
        &self,
        request: &DeconstructRequest,
    ) -> Result<Generated<Decomposition>, EngineError> {
        const OPERATION: &str = "deconstruct";
        let invention = request.validate(&self.limits)?;
        self.moderator.check(&[invention.as_str()]).await?;

        let key = CacheKey::new(CacheNamespace::Decomposition)
            .part(&invention)
            .build();
        if let Some(hit) = self.cache.decompositions.get(&key) {
            tracing::info!(operation = OPERATION, cache = "hit");
            return Ok(Generated::cached(hit));
        }
        tracing::info!(operation = OPERATION, cache = "miss");

        let chat = ChatRequest::new(prompts::deconstruct(&invention))
            .temperature(0.3)
            .max_tokens(2048)
            .json();
        let raw = self.chat(OPERATION, &chat).await?;

        let coerced: Coerced<Decomposition> = coercion::coerce(&raw, &invention);
        tracing::info!(operation = OPERATION, outcome = %coerced.outcome, "Coerced response");
        if !coerced.is_fallback() {
            self.cache.decompositions.set(key, coerced.value.clone());
        }
        Ok(Generated::fresh(coerced.value))
    }

    /// Produce development pathways for an invention in a target era
    pub async fn simulate(
        &self,
        request: &SimulateRequest,
    ) -> Result<Generated<Simulation>, EngineError> {
        const OPERATION: &str = "simulate";
        let params = request.validate(&self.limits)?;
        let mut fields = vec![params.invention.as_str(), params.era.as_str()];
        if let Some(decomposition) = &request.decomposition {
            fields.extend(decomposition.texts());
        }
        self.moderator.check(&fields).await?;

        let mut key = CacheKey::new(CacheNamespace::Simulation)
            .part(&params.invention)
            .part(&params.era)
            .part(params.depth.to_string())
            .part(format!("{:.2}", params.creativity));
        if let Some(decomposition) = &request.decomposition {
            key = key.digest(serde_json::to_vec(decomposition).unwrap_or_default());
        }
        let key = key.build();

        if let Some(hit) = self.cache.simulations.get(&key) {
            tracing::info!(operation = OPERATION, cache = "hit");
            return Ok(Generated::cached(hit));
        }
        tracing::info!(operation = OPERATION, cache = "miss");

        let prompt = prompts::simulate(
            &params.invention,
            &params.era,
            params.depth,
            params.creativity,
            request.decomposition.as_ref(),
        );
        let chat = ChatRequest::new(prompt)
            .temperature(params.creativity)
            .max_tokens(800 + 1200 * u32::from(params.depth))
            .json();
        let raw = self.chat(OPERATION, &chat).await?;

        let hint = format!("{} in {}", params.invention, params.era);
        let coerced: Coerced<Simulation> = coercion::coerce(&raw, &hint);
        tracing::info!(
            operation = OPERATION,
            outcome = %coerced.outcome,
            pathways = coerced.value.pathways.len(),
            "Coerced response"
        );
        if !coerced.is_fallback() {
            self.cache.simulations.set(key, coerced.value.clone());
        }
        Ok(Generated::fresh(coerced.value))
    }

    /// Tell the story of one pathway. Narratives are not cached.
    pub async fn narrate(&self, request: &NarrativeRequest) -> Result<String, EngineError> {
        const OPERATION: &str = "narrate";
        let (pathway, era) = request.validate(&self.limits)?;
        let mut fields = pathway.texts();
        fields.push(era.as_str());
        self.moderator.check(&fields).await?;

        let chat = ChatRequest::new(prompts::narrate(&pathway, &era))
            .temperature(0.8)
            .max_tokens(1500);
        let raw = self.chat(OPERATION, &chat).await?;

        let coerced = coercion::coerce_text(&raw, &pathway.title);
        tracing::info!(operation = OPERATION, outcome = %coerced.outcome, "Coerced response");
        Ok(coerced.value)
    }

    /// Illustrate a prompt, optionally in the setting of a pathway
    pub async fn generate_image(
        &self,
        request: &ImageGenerationRequest,
    ) -> Result<Generated<Vec<GeneratedImage>>, EngineError> {
        const OPERATION: &str = "generate-image";
        let params = request.validate(&self.limits)?;
        let mut fields = vec![params.prompt.as_str()];
        fields.extend(params.style.as_deref());
        fields.extend(params.era.as_deref());
        if let Some(pathway) = &params.pathway {
            fields.extend(pathway.texts());
        }
        self.moderator.check(&fields).await?;

        let prompt = prompts::visualize(
            &params.prompt,
            params.style.as_deref(),
            params.era.as_deref(),
            params.pathway.as_ref(),
        );
        let image_request = ImageRequest {
            prompt: prompt.flatten(),
            size: params.size,
        };

        // Everything that reaches the provider is part of the key
        let key = CacheKey::new(CacheNamespace::Image)
            .part(params.size.as_str())
            .digest(image_request.prompt.to_lowercase())
            .build();

        if let Some(hit) = self.cache.images.get(&key) {
            tracing::info!(operation = OPERATION, cache = "hit");
            return Ok(Generated::cached(hit));
        }
        tracing::info!(operation = OPERATION, cache = "miss");

        let routed = self
            .providers
            .image
            .call(&image_request)
            .await
            .map_err(|e| exhausted(OPERATION, e))?;

        tracing::info!(
            operation = OPERATION,
            provider = %routed.provider,
            images = routed.output.len(),
            "Images generated"
        );
        self.cache.images.set(key, routed.output.clone());
        Ok(Generated::fresh(routed.output))
    }

    /// Convert speech to text
    pub async fn transcribe(&self, clip: &AudioClip) -> Result<Generated<String>, EngineError> {
        const OPERATION: &str = "transcribe";
        requests::validate_audio(clip, &self.limits)?;

        let key = CacheKey::new(CacheNamespace::Transcription)
            .digest(&clip.bytes)
            .build();
        if let Some(hit) = self.cache.transcriptions.get(&key) {
            tracing::info!(operation = OPERATION, cache = "hit");
            return Ok(Generated::cached(hit));
        }
        tracing::info!(operation = OPERATION, cache = "miss", bytes = clip.bytes.len());

        let routed = self
            .providers
            .transcription
            .call(clip)
            .await
            .map_err(|e| exhausted(OPERATION, e))?;

        tracing::info!(operation = OPERATION, provider = %routed.provider, "Transcribed audio");
        self.cache.transcriptions.set(key, routed.output.clone());
        Ok(Generated::fresh(routed.output))
    }

    async fn chat(&self, operation: &str, request: &ChatRequest) -> Result<String, EngineError> {
        let routed = self
            .providers
            .text
            .call(request)
            .await
            .map_err(|e| exhausted(operation, e))?;
        tracing::info!(
            operation,
            provider = %routed.provider,
            attempts = routed.attempts,
            "Completion received"
        );
        Ok(routed.output)
    }
}

/// Convert a router failure into the client-facing error
fn exhausted(operation: &str, error: ProviderError) -> EngineError {
    let detail = match &error {
        ProviderError::AllProvidersFailed { attempted, last, .. } => format!(
            "tried {}; last error: {}",
            attempted.join(", "),
            last.last_error()
        ),
        other => other.to_string(),
    };
    EngineError::AllProvidersExhausted {
        operation: operation.to_string(),
        detail: secrets::scrub_truncated(&detail, MAX_DETAIL_CHARS),
    }
}
