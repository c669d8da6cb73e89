//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::{ChatTurn, Retrieval};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Run the ask command.
pub async fn run_ask(
    message: &str,
    model: Option<String>,
    history: Option<PathBuf>,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'svar doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let chat_history = match history {
        Some(path) => load_history(&path)?,
        None => Vec::new(),
    };

    let orchestrator = Orchestrator::new(&settings)?;

    let spinner = Output::spinner("Searching knowledge base...");
    let result = orchestrator
        .run(message, &chat_history, model.as_deref())
        .await;
    spinner.finish_and_clear();

    match result {
        Ok(response) => {
            println!("\n{}\n", response.reply);

            match &response.retrieval {
                Retrieval::Retrieved(passages) if !passages.is_empty() => {
                    Output::header("Sources");
                    for passage in passages {
                        Output::passage(passage, 100);
                    }
                }
                Retrieval::Degraded { reason, .. } => {
                    Output::warning(&format!("Answered without context: {}", reason));
                }
                _ => {}
            }
        }
        Err(e) => {
            Output::error(&e.user_message());
            return Err(e.into());
        }
    }

    Ok(())
}

/// Read earlier turns from a JSON array of `{role, text}` objects.
fn load_history(path: &Path) -> Result<Vec<ChatTurn>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file {}", path.display()))?;
    let turns: Vec<ChatTurn> = serde_json::from_str(&content)
        .with_context(|| format!("History file {} is not a JSON list of turns", path.display()))?;
    Ok(turns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turns.json");
        std::fs::write(
            &path,
            r#"[{"role": "user", "text": "When is it due?"}, {"role": "model", "content": "March 3."}]"#,
        )
        .unwrap();

        let turns = load_history(&path).unwrap();
        assert_eq!(turns, vec![ChatTurn::user("When is it due?"), ChatTurn::new("model", "March 3.")]);
    }

    #[test]
    fn test_load_history_rejects_non_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turns.json");
        std::fs::write(&path, r#"{"role": "user"}"#).unwrap();

        assert!(load_history(&path).is_err());
        assert!(load_history(&dir.path().join("missing.json")).is_err());
    }
}
