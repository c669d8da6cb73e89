//! Context retrieval and assembly for RAG prompts.

use crate::embedding::{check_dimensions, Embedder};
use crate::error::{FailureKind, SvarError};
use crate::vector_store::{RetrievedPassage, VectorStore};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Outcome of the retrieval half of a pipeline run.
///
/// Retrieval never fails a request. A failed embedding or search step
/// produces [`Retrieval::Degraded`], which behaves like "no context".
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// The search ran; the passages may be empty.
    Retrieved(Vec<RetrievedPassage>),
    /// Embedding or search failed and the run continues without context.
    Degraded { kind: FailureKind, reason: String },
    /// Retrieval is switched off in the configuration.
    Disabled,
}

impl Retrieval {
    fn degraded(kind: FailureKind, err: SvarError) -> Self {
        warn!(%kind, "Continuing without retrieved context: {}", err);
        Retrieval::Degraded {
            kind,
            reason: err.to_string(),
        }
    }

    /// Passages to assemble; empty unless the search succeeded.
    pub fn passages(&self) -> &[RetrievedPassage] {
        match self {
            Retrieval::Retrieved(passages) => passages,
            Retrieval::Degraded { .. } | Retrieval::Disabled => &[],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Retrieval::Degraded { .. })
    }
}

/// Embeds a query and searches the store for context.
pub struct ContextBuilder {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    match_count: usize,
    match_threshold: f32,
    verify_dimensions: bool,
}

impl ContextBuilder {
    /// Create a new context builder with a 0.5 threshold and a cap of 5.
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            vector_store,
            embedder,
            match_count: 5,
            match_threshold: 0.5,
            verify_dimensions: false,
        }
    }

    /// Set the maximum number of passages.
    pub fn with_match_count(mut self, match_count: usize) -> Self {
        self.match_count = match_count;
        self
    }

    /// Set the minimum similarity score threshold.
    pub fn with_match_threshold(mut self, match_threshold: f32) -> Self {
        self.match_threshold = match_threshold;
        self
    }

    /// Reject query vectors whose length differs from the embedder's dimensions.
    pub fn with_dimension_check(mut self, verify: bool) -> Self {
        self.verify_dimensions = verify;
        self
    }

    /// Embed `query` and search for passages.
    #[instrument(skip(self, query), fields(store = self.vector_store.name()))]
    pub async fn retrieve(&self, query: &str) -> Retrieval {
        let embedding = match self.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => return Retrieval::degraded(FailureKind::EmbeddingUnavailable, e),
        };

        match self
            .vector_store
            .search(&embedding, self.match_threshold, self.match_count)
            .await
        {
            Ok(passages) => {
                debug!("Retrieved {} passages", passages.len());
                Retrieval::Retrieved(passages)
            }
            Err(e) => Retrieval::degraded(FailureKind::SearchUnavailable, e),
        }
    }

    async fn embed(&self, query: &str) -> crate::error::Result<Vec<f32>> {
        let embedding = self.embedder.embed(query).await?;
        if self.verify_dimensions {
            check_dimensions(&embedding, self.embedder.dimensions())?;
        }
        Ok(embedding)
    }
}

/// Format passages into the context block placed in the system prompt.
///
/// Each passage becomes `[Source: label]` followed by its content; blocks are
/// separated by a blank line and keep the input order. No passages, no text.
pub fn assemble_context(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .map(|passage| format!("[Source: {}]\n{}", passage.source_label, passage.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
