//! SQLite-based vector store implementation.
//!
//! Searches a `documents` table populated by an external indexing job:
//!
//! ```sql
//! CREATE TABLE documents (
//!     id INTEGER PRIMARY KEY,
//!     content TEXT NOT NULL,
//!     source TEXT,
//!     embedding BLOB NOT NULL  -- little-endian f32 values
//! );
//! ```
//!
//! Cosine similarity is computed in Rust over every row, which is fine for
//! the small libraries this backend is meant for.

use super::{cosine_similarity, rank, RetrievedPassage, VectorStore};
use crate::error::{Result, SvarError};
use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open an existing database read-only.
    #[instrument(skip_all)]
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SvarError::Config(format!(
                "SQLite document store not found at {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        info!("Opened SQLite document store at {:?}", path);
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already opened connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedPassage>> {
        let conn = self.conn.lock().map_err(|e| {
            SvarError::SearchUnavailable(format!("Failed to acquire lock: {}", e))
        })?;

        let mut stmt = conn
            .prepare("SELECT content, source, embedding FROM documents ORDER BY id")
            .map_err(|e| SvarError::SearchUnavailable(format!("Query failed: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                let content: String = row.get(0)?;
                let source: Option<String> = row.get(1)?;
                let embedding_bytes: Vec<u8> = row.get(2)?;
                Ok((content, source, embedding_bytes))
            })
            .map_err(|e| SvarError::SearchUnavailable(format!("Query failed: {}", e)))?;

        let mut scored = Vec::new();
        for row in rows {
            match row {
                Ok((content, source, bytes)) => {
                    let embedding = Self::bytes_to_embedding(&bytes);
                    let score = cosine_similarity(query_embedding, &embedding);
                    scored.push(RetrievedPassage::new(content, source, score));
                }
                Err(e) => warn!("Skipping unreadable document row: {}", e),
            }
        }

        let results = rank(scored, threshold, limit);
        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
