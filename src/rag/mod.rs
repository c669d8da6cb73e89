//! RAG (Retrieval-Augmented Generation) prompt assembly.
//!
//! Retrieval ([`ContextBuilder`]), context formatting ([`assemble_context`])
//! and prompt construction ([`PromptBuilder`], [`build_conversation`]).

pub mod context;
pub mod prompt;

pub use context::{assemble_context, ContextBuilder, Retrieval};
pub use prompt::{
    build_conversation, normalize_role, ChatTurn, ConversationRole, ConversationTurn,
    PromptBuilder,
};
