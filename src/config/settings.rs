//! Configuration settings for Svar.

use crate::error::{Result, SvarError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub vector_store: VectorStoreSettings,
    pub generation: GenerationSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Hosted model provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Google Gemini REST API (default).
    #[default]
    Gemini,
    /// OpenAI API.
    OpenAI,
}

impl std::str::FromStr for ModelProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(ModelProvider::Gemini),
            "openai" => Ok(ModelProvider::OpenAI),
            _ => Err(format!("Unknown model provider: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelProvider::Gemini => write!(f, "gemini"),
            ModelProvider::OpenAI => write!(f, "openai"),
        }
    }
}

/// Embedding generation settings.
///
/// The model and dimensions must match whatever was used to index the store.
/// Nothing on this side can detect a different model, only a different length.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (gemini, openai).
    pub provider: ModelProvider,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Reject vectors whose length differs from `dimensions`.
    pub verify_dimensions: bool,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Override for the provider's API base URL.
    pub base_url: Option<String>,
    /// Timeout for a single embedding request.
    pub request_timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Gemini,
            model: "text-embedding-004".to_string(),
            dimensions: 768,
            verify_dimensions: true,
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: None,
            request_timeout_secs: 30,
        }
    }
}

/// Retrieval policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Enable context retrieval. When off, every run uses the bare persona prompt.
    pub enabled: bool,
    /// Minimum cosine similarity a passage needs to be returned by the store.
    /// Any value in [-1, 1]; negative values admit dissimilar passages.
    pub match_threshold: f32,
    /// Maximum number of passages to request.
    pub match_count: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            match_threshold: 0.5,
            match_count: 5,
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// Supabase/PostgREST `match_documents`-style RPC (default).
    #[default]
    Supabase,
    /// Local, pre-populated SQLite database.
    Sqlite,
}

impl std::str::FromStr for StoreProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "supabase" | "postgrest" => Ok(StoreProvider::Supabase),
            "sqlite" => Ok(StoreProvider::Sqlite),
            _ => Err(format!("Unknown vector store provider: {}", s)),
        }
    }
}

impl std::fmt::Display for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreProvider::Supabase => write!(f, "supabase"),
            StoreProvider::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (supabase, sqlite).
    pub provider: StoreProvider,
    /// Project URL (for supabase provider).
    pub supabase_url: Option<String>,
    /// Environment variable holding the service key (for supabase provider).
    pub supabase_key_env: String,
    /// Name of the similarity RPC function (for supabase provider).
    pub match_function: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Timeout for a single search request.
    pub request_timeout_secs: u64,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: StoreProvider::Supabase,
            supabase_url: None,
            supabase_key_env: "SUPABASE_SERVICE_ROLE_KEY".to_string(),
            match_function: "match_documents".to_string(),
            sqlite_path: "~/.svar/documents.db".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Text generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Generation provider (gemini, openai).
    pub provider: ModelProvider,
    /// Model used when a request does not name one.
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Override for the provider's API base URL.
    pub base_url: Option<String>,
    /// Timeout for a single generation request.
    pub request_timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Gemini,
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: None,
            request_timeout_secs: 120,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Origins allowed by the CORS layer. `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SvarError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check value ranges and URLs.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.retrieval.match_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(SvarError::Config(format!(
                "retrieval.match_threshold must be between -1 and 1, got {}",
                threshold
            )));
        }
        if self.retrieval.match_count == 0 {
            return Err(SvarError::Config(
                "retrieval.match_count must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(SvarError::Config(
                "embedding.dimensions must be at least 1".to_string(),
            ));
        }

        let urls = [
            ("embedding.base_url", self.embedding.base_url.as_deref()),
            ("generation.base_url", self.generation.base_url.as_deref()),
            ("vector_store.supabase_url", self.vector_store.supabase_url.as_deref()),
        ];
        for (key, value) in urls {
            if let Some(value) = value {
                url::Url::parse(value)
                    .map_err(|e| SvarError::Config(format!("{} is not a valid URL: {}", key, e)))?;
            }
        }

        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("svar")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }
}

impl EmbeddingSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl VectorStoreSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl GenerationSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Read an API key from the environment variable named `var`.
pub fn api_key_from_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        Ok(_) => Err(SvarError::Config(format!("{} is empty", var))),
        Err(_) => Err(SvarError::Config(format!("{} not set", var))),
    }
}
