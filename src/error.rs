//! Error types for Svar.

use thiserror::Error;

/// Failure kinds a pipeline run can encounter.
///
/// Only [`FailureKind::MissingMessage`] and [`FailureKind::GenerationFailed`]
/// ever reach the caller. The other kinds are absorbed by the orchestrator and
/// only show up in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MissingMessage,
    EmbeddingUnavailable,
    SearchUnavailable,
    GenerationFailed,
    EmptyGenerationResult,
}

impl FailureKind {
    /// Whether the pipeline can continue after this failure.
    pub fn is_fatal(self) -> bool {
        matches!(self, FailureKind::MissingMessage | FailureKind::GenerationFailed)
    }

    /// HTTP status the surrounding layer should answer with.
    pub fn status_hint(self) -> u16 {
        match self {
            FailureKind::MissingMessage => 400,
            _ => 500,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::MissingMessage => "MissingMessage",
            FailureKind::EmbeddingUnavailable => "EmbeddingUnavailable",
            FailureKind::SearchUnavailable => "SearchUnavailable",
            FailureKind::GenerationFailed => "GenerationFailed",
            FailureKind::EmptyGenerationResult => "EmptyGenerationResult",
        };
        write!(f, "{}", name)
    }
}

/// Library-level error type for Svar operations.
#[derive(Error, Debug)]
pub enum SvarError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Message is required")]
    MissingMessage,

    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Similarity search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("Generation failed{}: {message}", status_suffix(.status))]
    GenerationFailed {
        /// Upstream HTTP status, when the service answered at all.
        status: Option<u16>,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl SvarError {
    /// The pipeline failure kind this error represents, if any.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            SvarError::MissingMessage => Some(FailureKind::MissingMessage),
            SvarError::EmbeddingUnavailable(_) => Some(FailureKind::EmbeddingUnavailable),
            SvarError::SearchUnavailable(_) => Some(FailureKind::SearchUnavailable),
            SvarError::GenerationFailed { .. } => Some(FailureKind::GenerationFailed),
            _ => None,
        }
    }

    /// Message safe to show to an end user.
    ///
    /// Upstream response bodies stay in the logs; only the status code leaks.
    pub fn user_message(&self) -> String {
        match self {
            SvarError::MissingMessage => "Message is required".to_string(),
            SvarError::GenerationFailed { status: Some(status), .. } => {
                format!("Failed to generate a reply (upstream status {})", status)
            }
            SvarError::GenerationFailed { status: None, .. } => {
                "Failed to generate a reply".to_string()
            }
            _ => "Internal server error".to_string(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

/// Result type alias for Svar operations.
pub type Result<T> = std::result::Result<T, SvarError>;
