//! Gemini `generateContent` client.

use super::{Generation, Generator, GENERATION_PARAMS};
use crate::clients::http_client;
use crate::config::GenerationSettings;
use crate::error::{Result, SvarError};
use crate::gemini::{Content, GeminiEndpoint, API_KEY_HEADER};
use crate::rag::{ConversationRole, ConversationTurn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Gemini-based generator.
pub struct GeminiGenerator {
    client: reqwest::Client,
    endpoint: GeminiEndpoint,
}

impl GeminiGenerator {
    pub fn new(endpoint: GeminiEndpoint, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint,
        })
    }

    /// Create a generator from the `[generation]` settings section.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let endpoint =
            GeminiEndpoint::from_env(settings.base_url.as_deref(), &settings.api_key_env)?;
        Self::new(endpoint, settings.request_timeout())
    }
}

/// Gemini's name for each conversation role.
fn gemini_role(role: ConversationRole) -> &'static str {
    match role {
        ConversationRole::User => "user",
        ConversationRole::Model => "model",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, with all its text parts joined.
    fn text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        if let Some(reason) = &candidate.finish_reason {
            debug!("Finish reason: {}", reason);
        }
        let text: String = candidate
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        Some(text)
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    #[instrument(skip(self, conversation, system_prompt), fields(turns = conversation.len()))]
    async fn generate(
        &self,
        conversation: &[ConversationTurn],
        system_prompt: &str,
        model: &str,
    ) -> Result<Generation> {
        let request = GenerateContentRequest {
            contents: conversation
                .iter()
                .map(|turn| Content::text(Some(gemini_role(turn.role)), turn.text.clone()))
                .collect(),
            system_instruction: Content::text(None, system_prompt),
            generation_config: GenerationConfig {
                temperature: GENERATION_PARAMS.temperature,
                top_k: GENERATION_PARAMS.top_k,
                top_p: GENERATION_PARAMS.top_p,
                max_output_tokens: GENERATION_PARAMS.max_output_tokens,
            },
        };

        let url = self
            .endpoint
            .method_url(model, "generateContent")
            .map_err(|message| SvarError::GenerationFailed {
                status: None,
                message,
            })?;

        info!("Requesting generation from {}", model);

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, self.endpoint.api_key())
            .json(&request)
            .send()
            .await
            .map_err(|e| SvarError::GenerationFailed {
                status: e.status().map(|s| s.as_u16()),
                message: format!("Generation request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Generation API returned an error");
            return Err(SvarError::GenerationFailed {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| SvarError::GenerationFailed {
                status: None,
                message: format!("Malformed generation response: {}", e),
            })?;

        Ok(Generation::from_text(parsed.text()))
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
