use super::{ChatRequest, Provider, ProviderError};
use crate::config::GeminiConfig;
use crate::secrets::CredentialStore;
use async_trait::async_trait;
use serde_json::json;

pub struct GeminiProvider {
    config: GeminiConfig,
    credentials: CredentialStore,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig, credentials: CredentialStore) -> Self {
        Self {
            config,
            credentials,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider<ChatRequest> for GeminiProvider {
    type Output = String;

    fn name(&self) -> &str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.credentials.has_secret(&self.config.api_key_env)
    }

    async fn invoke(&self, request: &ChatRequest) -> super::Result<String> {
        let api_key = super::credential(&self.credentials, "gemini", &self.config.api_key_env)?;

        // Key goes in a header so it never appears in transport error URLs
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let mut generation_config = json!({
            "temperature": request.temperature,
            "maxOutputTokens": request.max_tokens,
        });
        if request.json {
            generation_config["responseMimeType"] = json!("application/json");
        }

        let payload = json!({
            "systemInstruction": { "parts": [{ "text": request.system }] },
            "contents": [{ "role": "user", "parts": [{ "text": request.user }] }],
            "generationConfig": generation_config,
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key.unsecure())
            .json(&payload)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let response = super::ensure_success(response).await?;

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let parts = data
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("No candidate content in response".to_string())
            })?;

        let mut full_text = String::new();
        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                full_text.push_str(text);
            }
        }

        if full_text.trim().is_empty() {
            return Err(ProviderError::InvalidResponse("Empty content".to_string()));
        }

        Ok(full_text)
    }
}
