//! HTTP client construction and the OpenAI endpoint shared by the provider backends.

use crate::config::api_key_from_env;
use crate::error::{Result, SvarError};
use std::time::Duration;

/// OpenAI REST API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Build a `reqwest` client with the given request timeout.
///
/// Every outbound call goes through a client built here so that no call can
/// hang forever. The client makes a single attempt per request; a failed
/// upstream call surfaces immediately instead of being retried.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SvarError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Connection details for an OpenAI-compatible REST API.
#[derive(Clone)]
pub struct OpenAIEndpoint {
    base_url: String,
    api_key: String,
}

impl OpenAIEndpoint {
    pub fn new(base_url: Option<&str>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(OPENAI_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
        }
    }

    /// Endpoint with the key read from the environment variable `api_key_env`.
    pub fn from_env(base_url: Option<&str>, api_key_env: &str) -> Result<Self> {
        Ok(Self::new(base_url, api_key_from_env(api_key_env)?))
    }

    /// URL for a resource under the API base, e.g. `chat/completions`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for OpenAIEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIEndpoint")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
