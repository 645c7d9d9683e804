use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Request, State},
    http::StatusCode,
    middleware::Next,
    response::IntoResponse,
    routing::{get, get_service, post},
};
use serde::{Deserialize, Serialize};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::config::AppConfig;
use crate::engine::ChatEngine;
use crate::intents::IntentStore;
use crate::session::{ChatMessage, SessionStore};

/// Load the intent store, train the engine, and serve until shutdown.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let store = IntentStore::load_or_seed(&config.engine.data_file)?;
    info!(
        name: "store.loaded",
        path = %config.engine.data_file,
        intents = store.len(),
        "Intent store loaded"
    );

    let engine = Arc::new(ChatEngine::new(
        store,
        config.engine.confidence_threshold,
    ));
    let sessions = SessionStore::new();

    let state = AppState {
        engine,
        sessions,
        config: config.clone(),
    };

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the full router. Split out so tests can drive it in-process.
pub fn build_router(state: AppState) -> Router {
    // A huge duration stands in for "disabled" so the middleware chain
    // keeps one type either way.
    let timeout_duration = if state.config.resilience.timeout_disabled {
        Duration::from_secs(365 * 24 * 60 * 60)
    } else {
        Duration::from_secs(30)
    };

    Router::new()
        .route("/", get_service(ServeFile::new("static/index.html")))
        .route("/health", get(health))
        .route("/api/chat", post(api_chat))
        .route("/api/intents", get(api_list_intents))
        .route("/api/sessions/{id}/messages", get(api_get_messages))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let duration = timeout_duration;
                async move {
                    match tokio::time::timeout(duration, next.run(req)).await {
                        Ok(res) => res,
                        Err(_) => {
                            (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response()
                        }
                    }
                }
            },
        ))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for chat API.
#[derive(Debug, Deserialize)]
struct ChatRequest {
    /// User message content.
    message: String,
    /// Optional session ID (creates new if not provided).
    #[serde(default)]
    session_id: Option<String>,
}

/// Response from chat API.
#[derive(Debug, Serialize)]
struct ChatResponse {
    /// The bot's reply.
    reply: String,
    /// Whether the next message from this session teaches an answer.
    teach_mode: bool,
    /// Session ID for this conversation.
    session_id: String,
}

/// POST /api/chat - One message in, one reply out.
///
/// Engine-level failures never surface as error statuses here; a valid
/// JSON body always gets a 200 with a reply.
async fn api_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let session = match req.session_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => state.sessions.get_or_create(id),
        None => state.sessions.create(),
    };

    tracing::info!(
        session_id = %session.id(),
        len = req.message.len(),
        "Received chat message"
    );

    let max = state.config.engine.max_message_len;
    let message: String = req.message.chars().take(max).collect();

    session.add_user_message(&message);
    let reply = state.engine.respond(&session, &message).await;
    session.add_bot_message(&reply.text);

    Json(ChatResponse {
        reply: reply.text,
        teach_mode: reply.teach_mode,
        session_id: session.id().to_string(),
    })
}

/// Intent summary DTO for the inspection API.
#[derive(Debug, Serialize)]
struct IntentSummary {
    tag: String,
    patterns: usize,
    responses: usize,
}

/// GET /api/intents - What the bot currently knows, by tag.
async fn api_list_intents(State(state): State<AppState>) -> Json<Vec<IntentSummary>> {
    let summaries = state
        .engine
        .intents()
        .await
        .into_iter()
        .map(|intent| IntentSummary {
            tag: intent.tag,
            patterns: intent.patterns.len(),
            responses: intent.responses.len(),
        })
        .collect();
    Json(summaries)
}

/// GET /api/sessions/:id/messages - Get the session transcript.
async fn api_get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    match state.sessions.get(&id) {
        Some(session) => Ok(Json(session.messages())),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn health() -> &'static str {
    "ok"
}
