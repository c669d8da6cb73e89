//! Gemini embeddings implementation.

use super::Embedder;
use crate::clients::http_client;
use crate::config::EmbeddingSettings;
use crate::error::{Result, SvarError};
use crate::gemini::{Content, GeminiEndpoint, API_KEY_HEADER};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Gemini-based embedder using `models/{model}:embedContent`.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    endpoint: GeminiEndpoint,
    model: String,
    dimensions: usize,
}

impl GeminiEmbedder {
    /// Create a new Gemini embedder.
    pub fn new(
        endpoint: GeminiEndpoint,
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
            GeminiEndpoint::from_env(settings.base_url.as_deref(), &settings.api_key_env)?;
        Self::new(
            endpoint,
            &settings.model,
            settings.dimensions as usize,
            settings.request_timeout(),
        )
    }
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    #[instrument(skip(self, text), fields(model = %self.model))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedContentRequest {
            model: format!(
                "models/{}",
                self.model.strip_prefix("models/").unwrap_or(&self.model)
            ),
            content: Content::text(None, text),
        };

        let url = self
            .endpoint
            .method_url(&self.model, "embedContent")
            .map_err(SvarError::EmbeddingUnavailable)?;

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.endpoint.api_key())
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

        let parsed: EmbedContentResponse = response.json().await.map_err(|e| {
            SvarError::EmbeddingUnavailable(format!("Malformed embedding response: {}", e))
        })?;

        let values = parsed
            .embedding
            .map(|e| e.values)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                SvarError::EmbeddingUnavailable("Empty embedding response".to_string())
            })?;

        debug!("Generated embedding with {} dimensions", values.len());
        Ok(values)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
