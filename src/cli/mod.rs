//! CLI module for Svar.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Svar - Retrieval-Augmented Chat Endpoint
///
/// Answers chat messages grounded in passages from a document store.
/// The name "Svar" comes from the Norwegian/Scandinavian word for "answer."
#[derive(Parser, Debug)]
#[command(name = "svar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "SVAR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP chat endpoint
    Serve {
        /// Host to bind to (overrides [server] host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides [server] port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single question
    Ask {
        /// The message to send
        message: String,

        /// Generation model to use
        #[arg(short, long)]
        model: Option<String>,

        /// JSON file with earlier turns: [{"role": "user", "text": "..."}]
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Start an interactive chat session
    Chat {
        /// Generation model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Search the document store without generating a reply
    Search {
        /// Search query
        query: String,

        /// Maximum number of results (defaults to [retrieval] match_count)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Minimum similarity score, 0.0-1.0 (defaults to [retrieval] match_threshold)
        #[arg(short, long)]
        min_score: Option<f32>,
    },

    /// Check API keys, store and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
