//! Wire types shared by the Gemini embedding and generation clients.

use crate::config::api_key_from_env;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Gemini REST API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Connection details for the Gemini REST API.
#[derive(Clone)]
pub struct GeminiEndpoint {
    base_url: String,
    api_key: String,
}

impl GeminiEndpoint {
    pub fn new(base_url: Option<&str>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(GEMINI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
        }
    }

    /// Endpoint with the key read from the environment variable `api_key_env`.
    pub fn from_env(base_url: Option<&str>, api_key_env: &str) -> Result<Self> {
        Ok(Self::new(base_url, api_key_from_env(api_key_env)?))
    }

    /// URL for `models/{model}:{method}`.
    ///
    /// The model name becomes a path segment, so anything other than ASCII
    /// letters, digits, `-`, `_` and `.` is rejected rather than spliced in.
    pub fn method_url(&self, model: &str, method: &str) -> std::result::Result<String, String> {
        let name = model.strip_prefix("models/").unwrap_or(model);
        let valid = !name.is_empty()
            && !name.contains("..")
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(format!("Invalid model name: {:?}", model));
        }
        Ok(format!("{}/models/{}:{}", self.base_url, name, method))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for GeminiEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiEndpoint")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// A piece of content: a role and its parts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

/// A content part. Only text parts are produced or read.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}
