//! Embedding generation for the query side of retrieval.
//!
//! The model used here must be the one the document store was indexed with.
//! A different model of the same length degrades search quality silently;
//! only a length mismatch can be caught locally, by [`check_dimensions`].

mod gemini;
mod openai;

pub use gemini::GeminiEmbedder;
pub use openai::OpenAIEmbedder;

use crate::config::{EmbeddingSettings, ModelProvider};
use crate::error::{Result, SvarError};
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding generation.
///
/// Failures are reported as [`SvarError::EmbeddingUnavailable`].
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier sent to the service.
    fn model(&self) -> &str;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Build the embedder selected in the settings.
pub fn from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match settings.provider {
        ModelProvider::Gemini => Arc::new(GeminiEmbedder::from_settings(settings)?),
        ModelProvider::OpenAI => Arc::new(OpenAIEmbedder::from_settings(settings)?),
    };
    Ok(embedder)
}

/// Reject a vector whose length differs from the indexed dimensionality.
pub fn check_dimensions(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() != expected {
        return Err(SvarError::EmbeddingUnavailable(format!(
            "dimension mismatch: got {}, store expects {}",
            vector.len(),
            expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dimensions() {
        assert!(check_dimensions(&[0.1, 0.2, 0.3], 3).is_ok());

        let err = check_dimensions(&[0.1, 0.2], 3).unwrap_err();
        assert!(matches!(err, SvarError::EmbeddingUnavailable(_)));
        assert!(err.to_string().contains("got 2, store expects 3"));
    }
}
