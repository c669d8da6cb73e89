//! Text generation clients.
//!
//! Every backend sends the same fixed sampling parameters,
//! [`GENERATION_PARAMS`]. They are policy, not per-request options.

mod gemini;
mod openai;

pub use gemini::GeminiGenerator;
pub use openai::OpenAIGenerator;

use crate::config::{GenerationSettings, ModelProvider};
use crate::error::Result;
use crate::rag::ConversationTurn;
use async_trait::async_trait;
use std::sync::Arc;

/// Sampling parameters sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

pub const GENERATION_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.9,
    top_k: 40,
    top_p: 0.95,
    max_output_tokens: 2048,
};

/// What a successful generation call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Text(String),
    /// The service answered but there was no text to extract.
    Empty,
}

impl Generation {
    /// Classify extracted text; blank text counts as no text.
    pub fn from_text(text: Option<String>) -> Self {
        match text {
            Some(text) if !text.trim().is_empty() => Generation::Text(text),
            _ => Generation::Empty,
        }
    }
}

/// Trait for text generation backends.
///
/// Non-success responses and transport failures are reported as
/// [`crate::error::SvarError::GenerationFailed`].
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a reply to `conversation` under `system_prompt` using `model`.
    async fn generate(
        &self,
        conversation: &[ConversationTurn],
        system_prompt: &str,
        model: &str,
    ) -> Result<Generation>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Build the generator selected in the settings.
pub fn from_settings(settings: &GenerationSettings) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match settings.provider {
        ModelProvider::Gemini => Arc::new(GeminiGenerator::from_settings(settings)?),
        ModelProvider::OpenAI => Arc::new(OpenAIGenerator::from_settings(settings)?),
    };
    Ok(generator)
}
