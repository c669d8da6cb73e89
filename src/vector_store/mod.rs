//! Similarity search over an externally populated document store.
//!
//! Provides a trait-based interface for different vector database backends.
//! Backends apply the score threshold, the ordering and the result cap
//! themselves; callers never re-filter or re-sort what comes back.

mod memory;
mod sqlite;
mod supabase;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;
pub use supabase::SupabaseVectorStore;

use crate::config::{Settings, StoreProvider};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Label used when a passage carries no source metadata.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// A passage returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    /// Text content of the passage.
    pub content: String,
    /// File name or other source the passage was taken from.
    pub source_label: String,
    /// Similarity score (higher is better).
    pub score: f32,
}

impl RetrievedPassage {
    /// Create a passage, defaulting a missing or blank source to [`UNKNOWN_SOURCE`].
    pub fn new(content: impl Into<String>, source_label: Option<String>, score: f32) -> Self {
        let source_label = source_label
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());
        Self {
            content: content.into(),
            source_label,
            score,
        }
    }
}

/// Trait for vector store implementations.
///
/// Failures are reported as [`crate::error::SvarError::SearchUnavailable`].
/// An empty result is not a failure.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return at most `limit` passages scoring at least `threshold`, best first.
    async fn search(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedPassage>>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Build the vector store selected in the settings.
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match settings.vector_store.provider {
        StoreProvider::Supabase => {
            Arc::new(SupabaseVectorStore::from_settings(&settings.vector_store)?)
        }
        StoreProvider::Sqlite => Arc::new(SqliteVectorStore::open(&settings.sqlite_path())?),
    };
    Ok(store)
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Rank scored passages the way the local backends do: threshold, then a
/// stable descending sort so equal scores keep storage order, then the cap.
fn rank(mut scored: Vec<RetrievedPassage>, threshold: f32, limit: usize) -> Vec<RetrievedPassage> {
    scored.retain(|p| p.score >= threshold);
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}
