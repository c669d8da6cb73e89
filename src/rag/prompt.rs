//! System prompt and conversation assembly.

use crate::config::Prompts;
use serde::{Deserialize, Serialize};

/// A prior turn as supplied by the caller.
///
/// The role is kept exactly as sent; see [`normalize_role`] for how it is
/// interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    #[serde(alias = "content")]
    pub text: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new("user", text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new("assistant", text)
    }
}

/// The two roles generation services understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConversationRole {
    User,
    /// Anything the user did not say: assistant replies, and every role we
    /// do not recognise.
    Model,
}

/// Map a caller-supplied role onto the two-role vocabulary.
///
/// Exactly `"user"` is the user. Every other string, including `"assistant"`,
/// `"system"`, `"User"` and roles invented by the client, becomes
/// [`ConversationRole::Model`]. Unknown roles are not an error. Adding a third
/// role means changing this function, not the callers.
pub fn normalize_role(role: &str) -> ConversationRole {
    match role {
        "user" => ConversationRole::User,
        _ => ConversationRole::Model,
    }
}

/// A normalized turn ready for a generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: ConversationRole,
    pub text: String,
}

/// Linearize `history` and append `query` as the final user turn.
///
/// Order is the input order followed by the query; nothing is dropped,
/// merged, or reordered.
pub fn build_conversation(history: &[ChatTurn], query: &str) -> Vec<ConversationTurn> {
    history
        .iter()
        .map(|turn| ConversationTurn {
            role: normalize_role(&turn.role),
            text: turn.text.clone(),
        })
        .chain(std::iter::once(ConversationTurn {
            role: ConversationRole::User,
            text: query.to_string(),
        }))
        .collect()
}

/// Builds system prompts from the persona template.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
    context_heading: String,
}

impl PromptBuilder {
    pub fn new(persona: impl Into<String>, context_heading: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            context_heading: context_heading.into(),
        }
    }

    pub fn from_prompts(prompts: &Prompts) -> Self {
        Self::new(prompts.persona(), prompts.assistant.context_heading.clone())
    }

    /// Persona, plus the context block under its heading when there is one.
    pub fn build_system_prompt(&self, context: &str) -> String {
        if context.is_empty() {
            return self.persona.clone();
        }
        format!("{}\n\n{}\n{}", self.persona, self.context_heading, context)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::from_prompts(&Prompts::default())
    }
}
