use super::{AudioClip, Provider, ProviderError};
use crate::config::{GroqConfig, OpenAIConfig};
use crate::secrets::CredentialStore;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

/// Whisper-compatible speech-to-text (`/audio/transcriptions`)
pub struct WhisperProvider {
    name: String,
    base_url: String,
    model: String,
    api_key_env: String,
    credentials: CredentialStore,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperProvider {
    pub fn compatible(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key_env: impl Into<String>,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key_env: api_key_env.into(),
            credentials,
            client: reqwest::Client::new(),
        }
    }

    pub fn openai(config: &OpenAIConfig, credentials: CredentialStore) -> Self {
        Self::compatible(
            "openai",
            &config.base_url,
            &config.transcription_model,
            &config.api_key_env,
            credentials,
        )
    }

    pub fn groq(config: &GroqConfig, credentials: CredentialStore) -> Self {
        Self::compatible(
            "groq",
            &config.base_url,
            &config.transcription_model,
            &config.api_key_env,
            credentials,
        )
    }

    fn file_part(clip: &AudioClip) -> Part {
        let part = Part::bytes(clip.bytes.clone()).file_name(clip.filename.clone());
        match part.mime_str(&clip.mime_type) {
            Ok(part) => part,
            Err(_) => Part::bytes(clip.bytes.clone()).file_name(clip.filename.clone()),
        }
    }
}

#[async_trait]
impl Provider<AudioClip> for WhisperProvider {
    type Output = String;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.credentials.has_secret(&self.api_key_env)
    }

    async fn invoke(&self, clip: &AudioClip) -> super::Result<String> {
        let api_key = super::credential(&self.credentials, &self.name, &self.api_key_env)?;

        let url = format!("{}/audio/transcriptions", self.base_url);

        let form = Form::new()
            .part("file", Self::file_part(clip))
            .text("model", self.model.clone())
            .text("response_format", "json");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.unsecure())
            .multipart(form)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let response = super::ensure_success(response).await?;

        let data: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(data.text.trim().to_string())
    }
}
