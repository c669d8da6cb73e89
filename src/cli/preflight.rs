//! Pre-flight checks before operations that call hosted services.
//!
//! Validates that required API keys and store settings are present
//! before starting operations that would otherwise fail midway.

use crate::config::{api_key_from_env, Settings, StoreProvider};
use crate::error::{Result, SvarError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Chatting needs the generation key, plus retrieval requirements when enabled.
    Chat,
    /// Search needs the embedding key and a reachable store.
    Search,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Chat => {
            api_key_from_env(&settings.generation.api_key_env)?;
            if settings.retrieval.enabled {
                check_retrieval(settings)?;
            }
        }
        Operation::Search => {
            check_retrieval(settings)?;
        }
    }
    Ok(())
}

fn check_retrieval(settings: &Settings) -> Result<()> {
    api_key_from_env(&settings.embedding.api_key_env)?;

    match settings.vector_store.provider {
        StoreProvider::Supabase => {
            if settings.vector_store.supabase_url.is_none() {
                return Err(SvarError::Config(
                    "vector_store.supabase_url is not set".to_string(),
                ));
            }
            api_key_from_env(&settings.vector_store.supabase_key_env)?;
        }
        StoreProvider::Sqlite => {
            let path = settings.sqlite_path();
            if !path.exists() {
                return Err(SvarError::Config(format!(
                    "SQLite document store not found at {}",
                    path.display()
                )));
            }
        }
    }

    Ok(())
}
