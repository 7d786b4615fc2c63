use super::{ChatRequest, Provider, ProviderError};
use crate::config::{GroqConfig, OpenAIConfig};
use crate::secrets::CredentialStore;
use async_trait::async_trait;
use serde_json::json;

/// Chat completions against any OpenAI-compatible endpoint.
///
/// Used for OpenAI itself and for Groq, which exposes the same API shape.
pub struct OpenAIProvider {
    name: String,
    base_url: String,
    model: String,
    api_key_env: String,
    credentials: CredentialStore,
    client: reqwest::Client,
}

impl OpenAIProvider {
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
            &config.chat_model,
            &config.api_key_env,
            credentials,
        )
    }

    pub fn groq(config: &GroqConfig, credentials: CredentialStore) -> Self {
        Self::compatible(
            "groq",
            &config.base_url,
            &config.chat_model,
            &config.api_key_env,
            credentials,
        )
    }
}

#[async_trait]
impl Provider<ChatRequest> for OpenAIProvider {
    type Output = String;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.credentials.has_secret(&self.api_key_env)
    }

    async fn invoke(&self, request: &ChatRequest) -> super::Result<String> {
        let api_key = super::credential(&self.credentials, &self.name, &self.api_key_env)?;

        let url = format!("{}/chat/completions", self.base_url);

        let mut payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if request.json {
            payload["response_format"] = json!({ "type": "json_object" });
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.unsecure())
            .json(&payload)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let response = super::ensure_success(response).await?;

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let content = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| ProviderError::InvalidResponse("No message content in response".to_string()))?;

        if content.trim().is_empty() {
            return Err(ProviderError::InvalidResponse("Empty content".to_string()));
        }

        Ok(content.to_string())
    }
}
