use super::{ImageRequest, ImageSize, Provider, ProviderError};
use crate::config::StabilityConfig;
use crate::secrets::CredentialStore;
use async_trait::async_trait;
use sdk::types::GeneratedImage;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// Stability AI v1 text-to-image
pub struct StabilityProvider {
    config: StabilityConfig,
    credentials: CredentialStore,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Artifact {
    #[serde(default)]
    base64: String,
    #[serde(default)]
    finish_reason: Option<String>,
}

impl StabilityProvider {
    pub fn new(config: StabilityConfig, credentials: CredentialStore) -> Self {
        Self {
            config,
            credentials,
            client: reqwest::Client::new(),
        }
    }

    /// SDXL only accepts a fixed set of dimensions; wide and tall map to
    /// the nearest supported ratio.
    fn dimensions(size: ImageSize) -> (u32, u32) {
        match size {
            ImageSize::Square => (1024, 1024),
            ImageSize::Landscape => (1344, 768),
            ImageSize::Portrait => (768, 1344),
        }
    }
}

#[async_trait]
impl Provider<ImageRequest> for StabilityProvider {
    type Output = Vec<GeneratedImage>;

    fn name(&self) -> &str {
        "stability"
    }

    fn is_configured(&self) -> bool {
        self.credentials.has_secret(&self.config.api_key_env)
    }

    async fn invoke(&self, request: &ImageRequest) -> super::Result<Vec<GeneratedImage>> {
        let api_key = super::credential(&self.credentials, "stability", &self.config.api_key_env)?;

        let url = format!(
            "{}/generation/{}/text-to-image",
            self.config.base_url.trim_end_matches('/'),
            self.config.engine
        );

        let (width, height) = Self::dimensions(request.size);
        let payload = json!({
            "text_prompts": [{ "text": request.prompt, "weight": 1.0 }],
            "cfg_scale": 7,
            "width": width,
            "height": height,
            "samples": 1,
            "steps": 30,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.unsecure())
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let response = super::ensure_success(response).await?;

        let data: GenerationResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let images: Vec<GeneratedImage> = data
            .artifacts
            .into_iter()
            .filter(|a| !a.base64.is_empty())
            .filter(|a| a.finish_reason.as_deref() != Some("CONTENT_FILTERED"))
            .map(|a| GeneratedImage {
                id: Uuid::new_v4().to_string(),
                url: format!("data:image/png;base64,{}", a.base64),
                provider: "stability".to_string(),
            })
            .collect();

        if images.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "No usable artifacts in response".to_string(),
            ));
        }

        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_are_sdxl_compatible() {
        assert_eq!(StabilityProvider::dimensions(ImageSize::Square), (1024, 1024));
        assert_eq!(StabilityProvider::dimensions(ImageSize::Landscape), (1344, 768));
        assert_eq!(StabilityProvider::dimensions(ImageSize::Portrait), (768, 1344));
    }
}
