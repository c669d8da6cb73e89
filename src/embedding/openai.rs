//! OpenAI embeddings implementation.

use super::Embedder;
use crate::clients::{http_client, OpenAIEndpoint};
use crate::config::EmbeddingSettings;
use crate::error::{Result, SvarError};
use async_openai::types::{CreateEmbeddingRequestArgs, CreateEmbeddingResponse, EmbeddingInput};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    endpoint: OpenAIEndpoint,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    pub fn new(
        endpoint: OpenAIEndpoint,
        model: &str,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint,
            model: model.to_string(),
            dimensions,
        })
    }

    /// Create an embedder from the `[embedding]` settings section.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let endpoint =
            OpenAIEndpoint::from_env(settings.base_url.as_deref(), &settings.api_key_env)?;
        Self::new(
            endpoint,
            &settings.model,
            settings.dimensions as usize,
            settings.request_timeout(),
        )
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text), fields(model = %self.model))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .dimensions(self.dimensions as u32)
            .build()
            .map_err(|e| {
                SvarError::EmbeddingUnavailable(format!("Failed to build request: {}", e))
            })?;

        let response = self
            .client
            .post(self.endpoint.url("embeddings"))
            .bearer_auth(self.endpoint.api_key())
            .json(&request)
            .send()
            .await
            .map_err(|e| SvarError::EmbeddingUnavailable(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Embedding API returned an error");
            debug!("Embedding API error body: {}", body);
            return Err(SvarError::EmbeddingUnavailable(format!(
                "Embedding API returned status {}",
                status.as_u16()
            )));
        }

        let response: CreateEmbeddingResponse = response.json().await.map_err(|e| {
            SvarError::EmbeddingUnavailable(format!("Malformed embedding response: {}", e))
        })?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                SvarError::EmbeddingUnavailable("Empty embedding response".to_string())
            })?;

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
