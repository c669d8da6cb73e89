//! Supabase (PostgREST RPC) vector store implementation.
//!
//! Calls a `match_documents`-style SQL function through
//! `POST {url}/rest/v1/rpc/{function}` with
//! `{query_embedding, match_threshold, match_count}`. The function does the
//! threshold filtering, ordering and limiting in the database.

use super::{RetrievedPassage, VectorStore};
use crate::clients::http_client;
use crate::config::{api_key_from_env, VectorStoreSettings};
use crate::error::{Result, SvarError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Supabase-backed vector store.
pub struct SupabaseVectorStore {
    client: reqwest::Client,
    rpc_url: Url,
    api_key: String,
}

impl SupabaseVectorStore {
    /// Create a store for the project at `project_url` calling `match_function`.
    pub fn new(
        project_url: &str,
        api_key: impl Into<String>,
        match_function: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let base = Url::parse(&format!("{}/", project_url.trim_end_matches('/')))?;
        let rpc_url = base.join(&format!("rest/v1/rpc/{}", match_function))?;

        Ok(Self {
            client: http_client(timeout)?,
            rpc_url,
            api_key: api_key.into(),
        })
    }

    /// Create a store from the `[vector_store]` settings section.
    pub fn from_settings(settings: &VectorStoreSettings) -> Result<Self> {
        let project_url = settings.supabase_url.as_deref().ok_or_else(|| {
            SvarError::Config("vector_store.supabase_url is required for the supabase provider".to_string())
        })?;
        let api_key = api_key_from_env(&settings.supabase_key_env)?;

        Self::new(
            project_url,
            api_key,
            &settings.match_function,
            settings.request_timeout(),
        )
    }
}

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_threshold: f32,
    match_count: usize,
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    content: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
    similarity: Option<f32>,
}

impl MatchRow {
    /// Source label from `metadata.filename`, falling back to `metadata.source`.
    fn source_label(&self) -> Option<String> {
        let metadata = self.metadata.as_ref()?;
        ["filename", "source"]
            .iter()
            .find_map(|key| metadata.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
    }

    fn into_passage(self) -> Option<RetrievedPassage> {
        let source = self.source_label();
        let content = self.content.filter(|c| !c.trim().is_empty())?;
        Some(RetrievedPassage::new(content, source, self.similarity.unwrap_or(0.0)))
    }
}

#[async_trait]
impl VectorStore for SupabaseVectorStore {
    #[instrument(skip(self, query_embedding), fields(dimensions = query_embedding.len()))]
    async fn search(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedPassage>> {
        let request = MatchRequest {
            query_embedding,
            match_threshold: threshold,
            match_count: limit,
        };

        let response = self
            .client
            .post(self.rpc_url.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SvarError::SearchUnavailable(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Similarity search returned an error");
            debug!("Similarity search error body: {}", body);
            return Err(SvarError::SearchUnavailable(format!(
                "Similarity search returned status {}",
                status.as_u16()
            )));
        }

        let rows: Vec<MatchRow> = response.json().await.map_err(|e| {
            SvarError::SearchUnavailable(format!("Malformed search response: {}", e))
        })?;

        let total = rows.len();
        let passages: Vec<RetrievedPassage> =
            rows.into_iter().filter_map(MatchRow::into_passage).collect();
        if passages.len() < total {
            warn!("Dropped {} rows without content", total - passages.len());
        }

        debug!("Found {} matching documents", passages.len());
        Ok(passages)
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}
