//! Svar - Retrieval-Augmented Chat Endpoint
//!
//! Answers chat messages with a language model whose system prompt is
//! grounded in passages found by vector-similarity search over a document
//! store.
//!
//! The name "Svar" comes from the Norwegian/Scandinavian word for "answer."
//!
//! # Overview
//!
//! One chat turn runs as a fixed chain:
//! - Embed the user's message
//! - Search the document store (threshold 0.5, at most 5 passages)
//! - Assemble the passages into a labeled context block
//! - Generate a reply under the persona plus context
//!
//! Embedding and search failures degrade to "no context"; a generation
//! failure ends the request.
//!
//! # Architecture
//!
//! - `config` - Configuration and prompt templates
//! - `embedding` - Embedding clients (Gemini, OpenAI)
//! - `vector_store` - Similarity search (Supabase, SQLite, in-memory)
//! - `rag` - Context assembly and prompt construction
//! - `generation` - Generation clients (Gemini, OpenAI)
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use svar::config::Settings;
//! use svar::orchestrator::{ChatOutcome, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(&settings)?;
//!
//!     match orchestrator
//!         .handle_chat_request("What is the proposal deadline?", &[], None)
//!         .await
//!     {
//!         ChatOutcome::Reply { reply } => println!("{}", reply),
//!         ChatOutcome::Error { error, .. } => eprintln!("{}", error),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod clients;
pub mod config;
pub mod embedding;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod orchestrator;
pub mod rag;
pub mod vector_store;

#[cfg(test)]
mod test_support;

pub use error::{Result, SvarError};
