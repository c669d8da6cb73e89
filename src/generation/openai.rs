//! OpenAI chat completions client.
//!
//! The chat completions API has no top-k parameter, so only temperature,
//! top-p and the token cap from [`GENERATION_PARAMS`] are sent.

use super::{Generation, Generator, GENERATION_PARAMS};
use crate::clients::{http_client, OpenAIEndpoint};
use crate::config::GenerationSettings;
use crate::error::{Result, SvarError};
use crate::rag::{ConversationRole, ConversationTurn};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// OpenAI-based generator.
///
/// Requests are typed with `async_openai` and sent over a plain `reqwest`
/// client, one attempt each, so upstream status codes reach the caller.
pub struct OpenAIGenerator {
    client: reqwest::Client,
    endpoint: OpenAIEndpoint,
}

impl OpenAIGenerator {
    pub fn new(endpoint: OpenAIEndpoint, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint,
        })
    }

    /// Create a generator from the `[generation]` settings section.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        let endpoint =
            OpenAIEndpoint::from_env(settings.base_url.as_deref(), &settings.api_key_env)?;
        Self::new(endpoint, settings.request_timeout())
    }
}

fn build_error(e: OpenAIError) -> SvarError {
    SvarError::GenerationFailed {
        status: None,
        message: format!("Failed to build request: {}", e),
    }
}

/// System message first, then the conversation with OpenAI role names.
fn build_messages(
    conversation: &[ConversationTurn],
    system_prompt: &str,
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt.to_string())
            .build()
            .map_err(build_error)?
            .into(),
    ];

    for turn in conversation {
        let message: ChatCompletionRequestMessage = match turn.role {
            ConversationRole::User => ChatCompletionRequestUserMessageArgs::default()
                .content(turn.text.clone())
                .build()
                .map_err(build_error)?
                .into(),
            ConversationRole::Model => ChatCompletionRequestAssistantMessageArgs::default()
                .content(turn.text.clone())
                .build()
                .map_err(build_error)?
                .into(),
        };
        messages.push(message);
    }

    Ok(messages)
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip(self, conversation, system_prompt), fields(turns = conversation.len()))]
    async fn generate(
        &self,
        conversation: &[ConversationTurn],
        system_prompt: &str,
        model: &str,
    ) -> Result<Generation> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(build_messages(conversation, system_prompt)?)
            .temperature(GENERATION_PARAMS.temperature)
            .top_p(GENERATION_PARAMS.top_p)
            .max_completion_tokens(GENERATION_PARAMS.max_output_tokens)
            .build()
            .map_err(build_error)?;

        info!("Requesting generation from {}", model);

        let response = self
            .client
            .post(self.endpoint.url("chat/completions"))
            .bearer_auth(self.endpoint.api_key())
            .json(&request)
            .send()
            .await
            .map_err(|e| SvarError::GenerationFailed {
                status: e.status().map(|s| s.as_u16()),
                message: format!("Chat request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Chat API returned an error");
            return Err(SvarError::GenerationFailed {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let response: CreateChatCompletionResponse =
            response.json().await.map_err(|e| SvarError::GenerationFailed {
                status: None,
                message: format!("Malformed chat response: {}", e),
            })?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);

        Ok(Generation::from_text(text))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
