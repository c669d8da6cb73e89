//! Configuration module for Svar.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AssistantPrompts, Prompts};
pub use settings::{
    api_key_from_env, EmbeddingSettings, GeneralSettings, GenerationSettings, ModelProvider,
    PromptSettings, RetrievalSettings, ServerSettings, Settings, StoreProvider,
    VectorStoreSettings,
};
