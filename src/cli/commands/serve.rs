//! HTTP chat endpoint.
//!
//! `POST /chat` runs one pipeline turn; `GET /health` reports liveness.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{ChatOutcome, ChatRequest, Orchestrator};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'svar doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(&settings)?;
    let state = Arc::new(AppState::new(orchestrator));
    let app = router(state, &settings.server.allowed_origins);

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Svar API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Chat", "POST /chat");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Build the router with CORS restricted to `allowed_origins` (`*` allows any).
pub fn router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {}", rejection.body_text()),
            );
        }
    };

    let span = info_span!("chat", request_id = %Uuid::new_v4());
    let outcome = state
        .orchestrator
        .handle_chat_request(&req.message, &req.chat_history, req.model.as_deref())
        .instrument(span)
        .await;

    match outcome {
        ChatOutcome::Reply { reply } => Json(ChatOutcome::Reply { reply }).into_response(),
        ChatOutcome::Error { error, status_hint } => error_response(
            StatusCode::from_u16(status_hint).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            error,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::error::{Result, SvarError};
    use crate::generation::{Generation, Generator};
    use crate::rag::ConversationTurn;
    use crate::test_support::spawn_fake;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// Replies with the number of turns it saw and the last message.
    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(
            &self,
            conversation: &[ConversationTurn],
            _system_prompt: &str,
            model: &str,
        ) -> Result<Generation> {
            let last = conversation.last().map(|t| t.text.as_str()).unwrap_or_default();
            Ok(Generation::Text(format!(
                "{} turns via {}: {}",
                conversation.len(),
                model,
                last
            )))
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    struct DownGenerator;

    #[async_trait]
    impl Generator for DownGenerator {
        async fn generate(
            &self,
            _conversation: &[ConversationTurn],
            _system_prompt: &str,
            _model: &str,
        ) -> Result<Generation> {
            Err(SvarError::GenerationFailed {
                status: Some(503),
                message: "model overloaded in region x".to_string(),
            })
        }

        fn name(&self) -> &'static str {
            "down"
        }
    }

    async fn serve_with(generator: Arc<dyn Generator>) -> String {
        let orchestrator =
            Orchestrator::with_components(None, generator, &Prompts::default(), "default-model");
        spawn_fake(router(Arc::new(AppState::new(orchestrator)), &["*".to_string()])).await
    }

    async fn post_chat(base: &str, body: Value) -> (StatusCode, Value) {
        let response = reqwest::Client::new()
            .post(format!("{}/chat", base))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let base = serve_with(Arc::new(EchoGenerator)).await;
        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_chat_reply() {
        let base = serve_with(Arc::new(EchoGenerator)).await;

        let (status, body) = post_chat(
            &base,
            json!({
                "message": "And the budget?",
                "chatHistory": [
                    { "role": "user", "text": "When is it due?" },
                    { "role": "model", "text": "March 3." }
                ],
                "model": "gemini-1.5-pro"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "reply": "3 turns via gemini-1.5-pro: And the budget?" })
        );
    }

    #[tokio::test]
    async fn test_missing_message_is_400() {
        let base = serve_with(Arc::new(EchoGenerator)).await;

        let (status, body) = post_chat(&base, json!({ "chatHistory": [] })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Message is required" }));

        let (status, _) = post_chat(&base, json!({ "message": "   " })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_generation_failure_is_500_without_upstream_body() {
        let base = serve_with(Arc::new(DownGenerator)).await;

        let (status, body) = post_chat(&base, json!({ "message": "Hello" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("503"));
        assert!(!error.contains("overloaded"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let base = serve_with(Arc::new(EchoGenerator)).await;

        let response = reqwest::Client::new()
            .post(format!("{}/chat", base))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[test]
    fn test_cors_layer_accepts_origin_list() {
        // Invalid header values are skipped rather than rejected
        let _ = cors_layer(&["https://grants.example.org".to_string(), "bad\nvalue".to_string()]);
        let _ = cors_layer(&["*".to_string()]);
    }
}
