use super::{ImageRequest, Provider, ProviderError};
use crate::config::OpenAIConfig;
use crate::secrets::CredentialStore;
use async_trait::async_trait;
use sdk::types::GeneratedImage;
use serde_json::json;
use uuid::Uuid;

/// OpenAI image generation (`/images/generations`)
pub struct OpenAIImageProvider {
    config: OpenAIConfig,
    credentials: CredentialStore,
    client: reqwest::Client,
}

impl OpenAIImageProvider {
    pub fn new(config: OpenAIConfig, credentials: CredentialStore) -> Self {
        Self {
            config,
            credentials,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider<ImageRequest> for OpenAIImageProvider {
    type Output = Vec<GeneratedImage>;

    fn name(&self) -> &str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        self.credentials.has_secret(&self.config.api_key_env)
    }

    async fn invoke(&self, request: &ImageRequest) -> super::Result<Vec<GeneratedImage>> {
        let api_key = super::credential(&self.credentials, "openai", &self.config.api_key_env)?;

        let url = format!(
            "{}/images/generations",
            self.config.base_url.trim_end_matches('/')
        );

        let payload = json!({
            "model": self.config.image_model,
            "prompt": request.prompt,
            "n": 1,
            "size": request.size.as_str(),
        });

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

        let items = data
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| ProviderError::InvalidResponse("No data array in response".to_string()))?;

        let images: Vec<GeneratedImage> = items
            .iter()
            .filter_map(|item| {
                let url = item
                    .get("url")
                    .and_then(|u| u.as_str())
                    .map(str::to_string)
                    .or_else(|| {
                        item.get("b64_json")
                            .and_then(|b| b.as_str())
                            .map(|b64| format!("data:image/png;base64,{}", b64))
                    })?;
                Some(GeneratedImage {
                    id: Uuid::new_v4().to_string(),
                    url,
                    provider: "openai".to_string(),
                })
            })
            .collect();

        if images.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "Response contained no images".to_string(),
            ));
        }

        Ok(images)
    }
}
