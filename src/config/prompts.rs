//! Prompt templates for Svar.
//!
//! Prompts can be customized by placing an `assistant.toml` file in the custom
//! prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub assistant: AssistantPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Persona and reply templates for the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantPrompts {
    /// Persona/behavior instructions sent as the system prompt.
    pub persona: String,
    /// Heading line placed above retrieved context.
    pub context_heading: String,
    /// Reply used when the model answers without any text.
    pub fallback_reply: String,
}

impl Default for AssistantPrompts {
    fn default() -> Self {
        Self {
            persona: r#"You are a knowledgeable, friendly assistant for {{organization}}. You help people find answers in the organization's documents and explain them clearly.

Guidelines:
- Answer in the same language the user writes in
- When knowledge base context is provided, base your answer on it and mention the source file it came from
- If the context does not cover the question, say so and answer from general knowledge only when it is safe to do so
- Never invent dates, figures, names or deadlines
- Keep answers concise; use short lists when they make things clearer
- Use earlier turns of the conversation to understand follow-up questions"#
                .to_string(),

            context_heading: "=== KNOWLEDGE BASE CONTEXT ===".to_string(),

            fallback_reply: "Sorry, I couldn't come up with a response to that. Could you try rephrasing your question?"
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let assistant_path = custom_path.join("assistant.toml");
            if assistant_path.exists() {
                let content = std::fs::read_to_string(&assistant_path)?;
                prompts.assistant = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// The persona template with custom variables applied.
    ///
    /// `{{organization}}` falls back to "our organization" when not configured.
    pub fn persona(&self) -> String {
        let mut vars = HashMap::new();
        vars.insert("organization".to_string(), "our organization".to_string());
        for (key, value) in &self.variables {
            vars.insert(key.clone(), value.clone());
        }
        Self::render(&self.assistant.persona, &vars)
    }

    /// The fallback reply with custom variables applied.
    pub fn fallback_reply(&self) -> String {
        Self::render(&self.assistant.fallback_reply, &self.variables)
    }
}
