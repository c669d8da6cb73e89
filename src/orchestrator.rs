//! Pipeline orchestrator for Svar.
//!
//! Runs one chat turn: embed the message, search for context, assemble the
//! system prompt and conversation, generate the reply.
//!
//! ```text
//! Start → Embedding → Searching → Assembling → Generating → Done
//!             │           │            ▲
//!             └───────────┴→ SkipRetrieval
//! ```
//!
//! Retrieval failures take the `SkipRetrieval` edge and the run continues
//! with an empty context block. Generation failures end the run.

use crate::config::{Prompts, Settings};
use crate::embedding;
use crate::error::{FailureKind, Result, SvarError};
use crate::generation::{self, Generation, Generator};
use crate::rag::{
    assemble_context, build_conversation, ChatTurn, ContextBuilder, PromptBuilder, Retrieval,
};
use crate::vector_store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// States a pipeline run moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStage {
    Start,
    Embedding,
    Searching,
    SkipRetrieval,
    Assembling,
    Generating,
    Done,
}

/// A chat request as received from the HTTP layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
    #[serde(default)]
    pub model: Option<String>,
}

/// A successful pipeline run.
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// Generated reply, or the fallback reply when the model returned no text.
    pub reply: String,
    /// Whether `reply` is the fallback text.
    pub fallback: bool,
    /// Model the reply was requested from.
    pub model: String,
    /// What the retrieval half of the run produced.
    pub retrieval: Retrieval,
    /// States visited, in order.
    pub stages: Vec<PipelineStage>,
}

/// Caller-facing result of [`Orchestrator::handle_chat_request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChatOutcome {
    Reply {
        reply: String,
    },
    Error {
        error: String,
        #[serde(rename = "statusHint")]
        status_hint: u16,
    },
}

/// The main orchestrator for the Svar pipeline.
pub struct Orchestrator {
    /// `None` when retrieval is disabled.
    context_builder: Option<ContextBuilder>,
    prompt_builder: PromptBuilder,
    generator: Arc<dyn Generator>,
    default_model: String,
    fallback_reply: String,
}

impl Orchestrator {
    /// Create an orchestrator with every collaborator built from the settings.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let generator = generation::from_settings(&settings.generation)?;

        let context_builder = if settings.retrieval.enabled {
            Some(Self::context_builder(settings)?)
        } else {
            info!("Context retrieval is disabled");
            None
        };

        info!(
            "Using {} generation ({}), retrieval {}",
            settings.generation.provider,
            settings.generation.model,
            if context_builder.is_some() { "enabled" } else { "disabled" }
        );

        Ok(Self::with_components(
            context_builder,
            generator,
            &prompts,
            &settings.generation.model,
        ))
    }

    /// Build only the retrieval half from the settings.
    pub fn context_builder(settings: &Settings) -> Result<ContextBuilder> {
        let embedder = embedding::from_settings(&settings.embedding)?;
        let store = vector_store::from_settings(settings)?;
        info!(
            "Retrieving from {} store with {} embeddings ({})",
            settings.vector_store.provider, settings.embedding.provider, settings.embedding.model
        );

        Ok(ContextBuilder::new(store, embedder)
            .with_match_count(settings.retrieval.match_count)
            .with_match_threshold(settings.retrieval.match_threshold)
            .with_dimension_check(settings.embedding.verify_dimensions))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        context_builder: Option<ContextBuilder>,
        generator: Arc<dyn Generator>,
        prompts: &Prompts,
        default_model: &str,
    ) -> Self {
        Self {
            context_builder,
            prompt_builder: PromptBuilder::from_prompts(prompts),
            generator,
            default_model: default_model.to_string(),
            fallback_reply: prompts.fallback_reply(),
        }
    }

    /// Handle one chat turn and shape the result for the caller.
    pub async fn handle_chat_request(
        &self,
        message: &str,
        chat_history: &[ChatTurn],
        model: Option<&str>,
    ) -> ChatOutcome {
        match self.run(message, chat_history, model).await {
            Ok(reply) => ChatOutcome::Reply { reply: reply.reply },
            Err(e) => {
                let fatal = e.kind().is_some_and(FailureKind::is_fatal);
                error!(kind = ?e.kind(), fatal, "Chat request failed: {}", e);
                ChatOutcome::Error {
                    error: e.user_message(),
                    status_hint: e.kind().map_or(500, FailureKind::status_hint),
                }
            }
        }
    }

    /// Run the pipeline for one chat turn.
    #[instrument(skip_all, fields(history = chat_history.len()))]
    pub async fn run(
        &self,
        message: &str,
        chat_history: &[ChatTurn],
        model: Option<&str>,
    ) -> Result<ChatReply> {
        if message.trim().is_empty() {
            return Err(SvarError::MissingMessage);
        }

        let mut stages = vec![PipelineStage::Start];

        let retrieval = self.retrieve(message).await;
        match &retrieval {
            Retrieval::Retrieved(_) => {
                stages.extend([PipelineStage::Embedding, PipelineStage::Searching]);
            }
            Retrieval::Degraded { kind, .. } => {
                stages.push(PipelineStage::Embedding);
                if *kind == FailureKind::SearchUnavailable {
                    stages.push(PipelineStage::Searching);
                }
                stages.push(PipelineStage::SkipRetrieval);
            }
            Retrieval::Disabled => {}
        }

        stages.push(PipelineStage::Assembling);
        let context = assemble_context(retrieval.passages());
        let system_prompt = self.prompt_builder.build_system_prompt(&context);
        let conversation = build_conversation(chat_history, message);
        debug!(
            "Assembled {} passages into {} chars of context, {} turns",
            retrieval.passages().len(),
            context.len(),
            conversation.len()
        );

        stages.push(PipelineStage::Generating);
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.default_model.as_str())
            .to_string();

        let generation = self
            .generator
            .generate(&conversation, &system_prompt, &model)
            .await?;

        let (reply, fallback) = match generation {
            Generation::Text(text) => (text, false),
            Generation::Empty => {
                info!(kind = %FailureKind::EmptyGenerationResult, "Model returned no text, using fallback reply");
                (self.fallback_reply.clone(), true)
            }
        };

        stages.push(PipelineStage::Done);
        info!(
            generator = self.generator.name(),
            degraded = retrieval.is_degraded(),
            "Generated reply ({} chars)",
            reply.len()
        );

        Ok(ChatReply {
            reply,
            fallback,
            model,
            retrieval,
            stages,
        })
    }

    /// Run only the retrieval half for `query`.
    pub async fn retrieve(&self, query: &str) -> Retrieval {
        match &self.context_builder {
            Some(builder) => builder.retrieve(query).await,
            None => Retrieval::Disabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use crate::rag::{ConversationRole, ConversationTurn};
    use crate::vector_store::{RetrievedPassage, VectorStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const PERSONA: &str = "You are the grants assistant.";
    const HEADING: &str = "## Context";
    const FALLBACK: &str = "No reply available.";

    #[derive(Default)]
    struct StubEmbedder {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SvarError::EmbeddingUnavailable("network unreachable".to_string()));
            }
            Ok(vec![0.1, 0.2, 0.3])
        }

        fn model(&self) -> &str {
            "stub"
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    /// Plays the part of the store: applies the threshold to canned rows.
    struct StubStore {
        rows: Vec<RetrievedPassage>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubStore {
        fn with_rows(rows: Vec<RetrievedPassage>) -> Self {
            Self {
                rows,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                rows: Vec::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VectorStore for StubStore {
        async fn search(
            &self,
            _query_embedding: &[f32],
            threshold: f32,
            limit: usize,
        ) -> Result<Vec<RetrievedPassage>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SvarError::SearchUnavailable("relation does not exist".to_string()));
            }
            Ok(self
                .rows
                .iter()
                .filter(|p| p.score >= threshold)
                .take(limit)
                .cloned()
                .collect())
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    enum Scripted {
        Reply(&'static str),
        Empty,
        Status(u16),
    }

    struct RecordingGenerator {
        script: Scripted,
        calls: Mutex<Vec<(Vec<ConversationTurn>, String, String)>>,
    }

    impl RecordingGenerator {
        fn new(script: Scripted) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_system_prompt(&self) -> String {
            self.calls.lock().unwrap().last().unwrap().1.clone()
        }

        fn last_conversation(&self) -> Vec<ConversationTurn> {
            self.calls.lock().unwrap().last().unwrap().0.clone()
        }

        fn last_model(&self) -> String {
            self.calls.lock().unwrap().last().unwrap().2.clone()
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn generate(
            &self,
            conversation: &[ConversationTurn],
            system_prompt: &str,
            model: &str,
        ) -> Result<Generation> {
            self.calls.lock().unwrap().push((
                conversation.to_vec(),
                system_prompt.to_string(),
                model.to_string(),
            ));
            match self.script {
                Scripted::Reply(text) => Ok(Generation::Text(text.to_string())),
                Scripted::Empty => Ok(Generation::Empty),
                Scripted::Status(status) => Err(SvarError::GenerationFailed {
                    status: Some(status),
                    message: "upstream said no".to_string(),
                }),
            }
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn prompts() -> Prompts {
        let mut prompts = Prompts::default();
        prompts.assistant.persona = PERSONA.to_string();
        prompts.assistant.context_heading = HEADING.to_string();
        prompts.assistant.fallback_reply = FALLBACK.to_string();
        prompts
    }

    fn orchestrator(
        embedder: Arc<StubEmbedder>,
        store: Arc<StubStore>,
        generator: Arc<RecordingGenerator>,
    ) -> Orchestrator {
        let builder = ContextBuilder::new(store, embedder)
            .with_match_threshold(0.5)
            .with_match_count(5);
        Orchestrator::with_components(Some(builder), generator, &prompts(), "default-model")
    }

    fn deadline_rows() -> Vec<RetrievedPassage> {
        vec![
            RetrievedPassage::new(
                "Full proposals are due on March 3 at 5pm.",
                Some("brief.pdf".to_string()),
                0.8,
            ),
            RetrievedPassage::new(
                "Reminder: letters of intent go out two weeks before the deadline.",
                Some("notes.txt".to_string()),
                0.6,
            ),
        ]
    }

    #[tokio::test]
    async fn test_empty_message_never_reaches_embedding() {
        let embedder = Arc::new(StubEmbedder::default());
        let store = Arc::new(StubStore::with_rows(deadline_rows()));
        let generator = RecordingGenerator::new(Scripted::Reply("unused"));
        let orchestrator = orchestrator(embedder.clone(), store.clone(), generator.clone());

        for message in ["", "   ", "\n\t"] {
            let err = orchestrator.run(message, &[], None).await.unwrap_err();
            assert_eq!(err.kind(), Some(FailureKind::MissingMessage));
        }

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.call_count(), 0);

        let outcome = orchestrator.handle_chat_request("", &[], None).await;
        assert_eq!(
            outcome,
            ChatOutcome::Error {
                error: "Message is required".to_string(),
                status_hint: 400
            }
        );
    }

    #[tokio::test]
    async fn test_proposal_deadline_scenario() {
        let embedder = Arc::new(StubEmbedder::default());
        let store = Arc::new(StubStore::with_rows(deadline_rows()));
        let generator = RecordingGenerator::new(Scripted::Reply("March 3 at 5pm."));
        let orchestrator = orchestrator(embedder, store, generator.clone());

        let reply = orchestrator
            .run("What is the proposal deadline?", &[], None)
            .await
            .unwrap();
        assert_eq!(reply.reply, "March 3 at 5pm.");
        assert!(!reply.fallback);
        assert_eq!(
            reply.stages,
            vec![
                PipelineStage::Start,
                PipelineStage::Embedding,
                PipelineStage::Searching,
                PipelineStage::Assembling,
                PipelineStage::Generating,
                PipelineStage::Done,
            ]
        );

        let system_prompt = generator.last_system_prompt();
        assert!(system_prompt.starts_with(PERSONA));
        assert!(system_prompt.contains(HEADING));
        let brief = system_prompt.find("[Source: brief.pdf]").unwrap();
        let notes = system_prompt.find("[Source: notes.txt]").unwrap();
        assert!(brief < notes);
        assert!(system_prompt.contains("Full proposals are due on March 3 at 5pm."));

        let conversation = generator.last_conversation();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation[0].role, ConversationRole::User);
        assert_eq!(conversation[0].text, "What is the proposal deadline?");
        assert_eq!(generator.last_model(), "default-model");
    }

    #[tokio::test]
    async fn test_all_passages_below_threshold_gives_bare_persona() {
        let rows = vec![
            RetrievedPassage::new("weak", Some("a.txt".to_string()), 0.49),
            RetrievedPassage::new("weaker", Some("b.txt".to_string()), 0.1),
        ];
        let generator = RecordingGenerator::new(Scripted::Reply("ok"));
        let orchestrator = orchestrator(
            Arc::new(StubEmbedder::default()),
            Arc::new(StubStore::with_rows(rows)),
            generator.clone(),
        );

        let reply = orchestrator.run("anything?", &[], None).await.unwrap();
        assert_eq!(reply.retrieval, Retrieval::Retrieved(Vec::new()));
        assert_eq!(generator.last_system_prompt(), PERSONA);
    }

    #[tokio::test]
    async fn test_embedding_failure_still_generates() {
        let embedder = Arc::new(StubEmbedder {
            fail: true,
            ..Default::default()
        });
        let store = Arc::new(StubStore::with_rows(deadline_rows()));
        let generator = RecordingGenerator::new(Scripted::Reply("Hi there!"));
        let orchestrator = orchestrator(embedder, store.clone(), generator.clone());

        let reply = orchestrator.run("Hello", &[], None).await.unwrap();
        assert_eq!(reply.reply, "Hi there!");
        assert!(reply.retrieval.is_degraded());
        assert_eq!(
            reply.stages,
            vec![
                PipelineStage::Start,
                PipelineStage::Embedding,
                PipelineStage::SkipRetrieval,
                PipelineStage::Assembling,
                PipelineStage::Generating,
                PipelineStage::Done,
            ]
        );
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.call_count(), 1);
        assert_eq!(generator.last_system_prompt(), PERSONA);
    }

    #[tokio::test]
    async fn test_search_failure_still_generates() {
        let generator = RecordingGenerator::new(Scripted::Reply("Hi"));
        let orchestrator = orchestrator(
            Arc::new(StubEmbedder::default()),
            Arc::new(StubStore::failing()),
            generator.clone(),
        );

        let reply = orchestrator.run("Hello", &[], None).await.unwrap();
        assert!(matches!(
            reply.retrieval,
            Retrieval::Degraded { kind: FailureKind::SearchUnavailable, .. }
        ));
        assert!(reply.stages.contains(&PipelineStage::Searching));
        assert!(reply.stages.contains(&PipelineStage::SkipRetrieval));
        assert_eq!(generator.last_system_prompt(), PERSONA);
    }

    #[tokio::test]
    async fn test_generation_failure_is_terminal() {
        let generator = RecordingGenerator::new(Scripted::Status(502));
        let orchestrator = orchestrator(
            Arc::new(StubEmbedder::default()),
            Arc::new(StubStore::with_rows(deadline_rows())),
            generator,
        );

        let err = orchestrator.run("Hello", &[], None).await.unwrap_err();
        assert_eq!(err.kind(), Some(FailureKind::GenerationFailed));

        let outcome = orchestrator.handle_chat_request("Hello", &[], None).await;
        match outcome {
            ChatOutcome::Error { error, status_hint } => {
                assert_eq!(status_hint, 500);
                assert!(error.contains("502"));
                assert!(!error.contains("upstream said no"));
            }
            ChatOutcome::Reply { .. } => panic!("expected an error outcome"),
        }
    }

    #[tokio::test]
    async fn test_empty_generation_uses_fallback() {
        let generator = RecordingGenerator::new(Scripted::Empty);
        let orchestrator = orchestrator(
            Arc::new(StubEmbedder::default()),
            Arc::new(StubStore::with_rows(Vec::new())),
            generator,
        );

        let reply = orchestrator.run("Hello", &[], None).await.unwrap();
        assert_eq!(reply.reply, FALLBACK);
        assert!(reply.fallback);

        let outcome = orchestrator.handle_chat_request("Hello", &[], None).await;
        assert_eq!(
            outcome,
            ChatOutcome::Reply {
                reply: FALLBACK.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_history_and_model_override() {
        let generator = RecordingGenerator::new(Scripted::Reply("ok"));
        let orchestrator = orchestrator(
            Arc::new(StubEmbedder::default()),
            Arc::new(StubStore::with_rows(Vec::new())),
            generator.clone(),
        );

        let history = vec![
            ChatTurn::user("When is it due?"),
            ChatTurn::assistant("March 3."),
            ChatTurn::new("system", "internal note"),
        ];
        orchestrator
            .run("And the budget?", &history, Some("gemini-1.5-pro"))
            .await
            .unwrap();

        let conversation = generator.last_conversation();
        assert_eq!(conversation.len(), history.len() + 1);
        assert_eq!(conversation[2].role, ConversationRole::Model);
        assert_eq!(conversation[3].text, "And the budget?");
        assert_eq!(generator.last_model(), "gemini-1.5-pro");

        orchestrator.run("Again", &history, Some("  ")).await.unwrap();
        assert_eq!(generator.last_model(), "default-model");
    }

    #[tokio::test]
    async fn test_disabled_retrieval_skips_collaborators() {
        let generator = RecordingGenerator::new(Scripted::Reply("ok"));
        let orchestrator =
            Orchestrator::with_components(None, generator.clone(), &prompts(), "default-model");

        let reply = orchestrator.run("Hello", &[], None).await.unwrap();
        assert_eq!(reply.retrieval, Retrieval::Disabled);
        assert_eq!(
            reply.stages,
            vec![
                PipelineStage::Start,
                PipelineStage::Assembling,
                PipelineStage::Generating,
                PipelineStage::Done,
            ]
        );
        assert_eq!(generator.last_system_prompt(), PERSONA);
    }

    #[test]
    fn test_chat_request_wire_format() {
        let request: ChatRequest = serde_json::from_str(
            r#"{
                "message": "What is the proposal deadline?",
                "chatHistory": [{"role": "user", "text": "hi"}, {"role": "model", "content": "hello"}],
                "model": "gemini-1.5-pro"
            }"#,
        )
        .unwrap();
        assert_eq!(request.chat_history.len(), 2);
        assert_eq!(request.chat_history[1].text, "hello");
        assert_eq!(request.model.as_deref(), Some("gemini-1.5-pro"));

        let request: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(request.message.is_empty());
        assert!(request.chat_history.is_empty());
    }

    #[test]
    fn test_chat_outcome_serialization() {
        let reply = serde_json::to_value(ChatOutcome::Reply {
            reply: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(reply, serde_json::json!({ "reply": "hi" }));

        let error = serde_json::to_value(ChatOutcome::Error {
            error: "Message is required".to_string(),
            status_hint: 400,
        })
        .unwrap();
        assert_eq!(
            error,
            serde_json::json!({ "error": "Message is required", "statusHint": 400 })
        );
    }
}
