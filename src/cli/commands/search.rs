//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::Retrieval;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    limit: Option<usize>,
    min_score: Option<f32>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'svar doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let context_builder = Orchestrator::context_builder(&settings)?
        .with_match_count(limit.unwrap_or(settings.retrieval.match_count))
        .with_match_threshold(min_score.unwrap_or(settings.retrieval.match_threshold));

    let spinner = Output::spinner("Searching...");
    let retrieval = context_builder.retrieve(query).await;
    spinner.finish_and_clear();

    match retrieval {
        Retrieval::Retrieved(passages) if passages.is_empty() => {
            Output::warning("No results found matching your query.");
        }
        Retrieval::Retrieved(passages) => {
            Output::success(&format!("Found {} results", passages.len()));
            for passage in &passages {
                Output::passage(passage, 200);
            }
        }
        Retrieval::Degraded { kind, reason } => {
            Output::error(&format!("Search failed: {}", reason));
            return Err(anyhow::anyhow!("{}: {}", kind, reason));
        }
        Retrieval::Disabled => {}
    }

    Ok(())
}
