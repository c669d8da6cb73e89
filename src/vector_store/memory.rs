//! In-memory vector store implementation.
//!
//! Populated through [`MemoryVectorStore::insert`] by library callers and tests;
//! it is not selectable from the config file.

use super::{cosine_similarity, rank, RetrievedPassage, VectorStore};
use crate::error::{Result, SvarError};
use async_trait::async_trait;
use std::sync::RwLock;

/// A document held by the in-memory store.
#[derive(Debug, Clone)]
struct StoredDocument {
    content: String,
    source: Option<String>,
    embedding: Vec<f32>,
}

/// In-memory vector store.
pub struct MemoryVectorStore {
    documents: RwLock<Vec<StoredDocument>>,
}

impl MemoryVectorStore {
    /// Create a new, empty in-memory vector store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
        }
    }

    /// Add a document. Insertion order is the tie-break order for equal scores.
    pub fn insert(
        &self,
        content: impl Into<String>,
        source: Option<&str>,
        embedding: Vec<f32>,
    ) -> Result<()> {
        let mut docs = self
            .documents
            .write()
            .map_err(|e| SvarError::SearchUnavailable(format!("Failed to acquire lock: {}", e)))?;
        docs.push(StoredDocument {
            content: content.into(),
            source: source.map(str::to_string),
            embedding,
        });
        Ok(())
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn search(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedPassage>> {
        let docs = self
            .documents
            .read()
            .map_err(|e| SvarError::SearchUnavailable(format!("Failed to acquire lock: {}", e)))?;

        let scored = docs
            .iter()
            .map(|doc| {
                RetrievedPassage::new(
                    doc.content.clone(),
                    doc.source.clone(),
                    cosine_similarity(query_embedding, &doc.embedding),
                )
            })
            .collect();

        Ok(rank(scored, threshold, limit))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
