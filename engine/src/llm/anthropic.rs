use super::{ChatRequest, Provider, ProviderError};
use crate::config::AnthropicConfig;
use crate::secrets::CredentialStore;
use async_trait::async_trait;
use serde_json::json;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    config: AnthropicConfig,
    credentials: CredentialStore,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig, credentials: CredentialStore) -> Self {
        Self {
            config,
            credentials,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider<ChatRequest> for AnthropicProvider {
    type Output = String;

    fn name(&self) -> &str {
        "anthropic"
    }

    fn is_configured(&self) -> bool {
        self.credentials.has_secret(&self.config.api_key_env)
    }

    async fn invoke(&self, request: &ChatRequest) -> super::Result<String> {
        let api_key = super::credential(&self.credentials, "anthropic", &self.config.api_key_env)?;

        let url = format!("{}/messages", self.config.base_url.trim_end_matches('/'));

        // No native JSON mode: prefill the assistant turn with an opening brace
        let mut messages = vec![json!({ "role": "user", "content": request.user })];
        if request.json {
            messages.push(json!({ "role": "assistant", "content": "{" }));
        }

        let payload = json!({
            "model": self.config.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature.min(1.0),
            "system": request.system,
            "messages": messages,
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key.unsecure())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let response = super::ensure_success(response).await?;

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let content_arr = data
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| ProviderError::InvalidResponse("No content array in response".to_string()))?;

        let mut full_content = String::new();
        for item in content_arr {
            if let Some(text) = item.get("text").and_then(|t| t.as_str()) {
                full_content.push_str(text);
            }
        }

        if full_content.trim().is_empty() {
            return Err(ProviderError::InvalidResponse("Empty content".to_string()));
        }

        if request.json && !full_content.trim_start().starts_with('{') {
            full_content.insert(0, '{');
        }

        Ok(full_content)
    }
}
