//! Interactive chat command.
//!
//! The pipeline keeps no state between turns, so the session holds the
//! transcript and sends it along with every message.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::rag::ChatTurn;
use console::style;
use std::io::{self, BufRead, Write};
use tracing::debug;

/// Most turns sent as history; older turns are dropped first.
const MAX_HISTORY_TURNS: usize = 30;

/// Run the interactive chat command.
pub async fn run_chat(model: Option<String>, settings: Settings) -> anyhow::Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'svar doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(&settings)?;
    let mut chat = ChatSession::new(orchestrator, model);

    println!("\n{}", style("Svar Chat").bold().cyan());
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            // EOF
            println!();
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            chat.clear_history();
            Output::info("Conversation history cleared.");
            continue;
        }

        let spinner = Output::spinner("Thinking...");
        let result = chat.send_message(input).await;
        spinner.finish_and_clear();

        match result {
            Ok(reply) => {
                println!("\n{} {}\n", style("Svar:").cyan().bold(), reply);
            }
            Err(e) => {
                Output::error(&e.user_message());
            }
        }
    }

    Ok(())
}

/// Chat session holding the local transcript.
struct ChatSession {
    orchestrator: Orchestrator,
    model: Option<String>,
    history: Vec<ChatTurn>,
}

impl ChatSession {
    fn new(orchestrator: Orchestrator, model: Option<String>) -> Self {
        Self {
            orchestrator,
            model,
            history: Vec::new(),
        }
    }

    fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Send a message with the transcript so far and record both turns.
    ///
    /// A failed turn leaves the transcript untouched.
    async fn send_message(&mut self, message: &str) -> Result<String> {
        debug!("Chat turn with {} turns of history", self.history.len());

        let response = self
            .orchestrator
            .run(message, &self.history, self.model.as_deref())
            .await?;

        self.history.push(ChatTurn::user(message));
        self.history.push(ChatTurn::new("model", response.reply.clone()));
        self.trim_history(MAX_HISTORY_TURNS);

        Ok(response.reply)
    }

    /// Keep only the last `max_turns` turns.
    fn trim_history(&mut self, max_turns: usize) {
        if self.history.len() > max_turns {
            let excess = self.history.len() - max_turns;
            self.history.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::error::SvarError;
    use crate::generation::{Generation, Generator};
    use crate::rag::ConversationTurn;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Reports how many turns it was sent; fails on "boom".
    struct CountingGenerator;

    #[async_trait]
    impl Generator for CountingGenerator {
        async fn generate(
            &self,
            conversation: &[ConversationTurn],
            _system_prompt: &str,
            _model: &str,
        ) -> Result<Generation> {
            if conversation.last().is_some_and(|t| t.text == "boom") {
                return Err(SvarError::GenerationFailed {
                    status: None,
                    message: "boom".to_string(),
                });
            }
            Ok(Generation::Text(format!("saw {}", conversation.len())))
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn session() -> ChatSession {
        let orchestrator = Orchestrator::with_components(
            None,
            Arc::new(CountingGenerator),
            &Prompts::default(),
            "m",
        );
        ChatSession::new(orchestrator, None)
    }

    #[tokio::test]
    async fn test_session_sends_transcript() {
        let mut chat = session();

        assert_eq!(chat.send_message("first").await.unwrap(), "saw 1");
        assert_eq!(chat.send_message("second").await.unwrap(), "saw 3");
        assert_eq!(chat.history.len(), 4);
        assert_eq!(chat.history[1], ChatTurn::new("model", "saw 1"));

        chat.clear_history();
        assert_eq!(chat.send_message("again").await.unwrap(), "saw 1");
    }

    #[tokio::test]
    async fn test_failed_turn_leaves_transcript() {
        let mut chat = session();
        chat.send_message("first").await.unwrap();

        assert!(chat.send_message("boom").await.is_err());
        assert_eq!(chat.history.len(), 2);
    }

    #[test]
    fn test_trim_history_drops_oldest() {
        let mut chat = session();
        chat.history = (0..35).map(|i| ChatTurn::user(i.to_string())).collect();

        chat.trim_history(MAX_HISTORY_TURNS);
        assert_eq!(chat.history.len(), MAX_HISTORY_TURNS);
        assert_eq!(chat.history[0].text, "5");
    }
}
