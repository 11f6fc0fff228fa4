//! HTTP chat surface.
//!
//! Exposes the query-response pipeline and the session history as a small
//! JSON API. The surface is deliberately thin: it validates prompts,
//! sequences one interaction at a time, and renders chat turns — all
//! retrieval and synthesis happens behind the [`QueryEngine`] seam.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Submit a prompt, get the assistant turn |
//! | `GET`  | `/history` | The session's ordered turn list |
//! | `POST` | `/history/clear` | Empty the session history |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Validation failures return the JSON error schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "prompt must not be empty" } }
//! ```
//!
//! Query failures are not HTTP errors: the pipeline converts them into a
//! normal assistant turn (`"An error occurred: ..."`) so the chat surface
//! stays usable.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::ChatTurn;
use crate::query::{self, QueryEngine};
use crate::session::ChatSession;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    engine: Arc<dyn QueryEngine>,
    /// The single in-process session. Held across a whole interaction so
    /// each query runs to completion before the next is accepted.
    session: Arc<Mutex<ChatSession>>,
}

/// Starts the chat server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config, engine: Arc<dyn QueryEngine>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        engine,
        session: Arc::new(Mutex::new(ChatSession::new())),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    println!("Chat server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handle_chat))
        .route("/history", get(handle_history))
        .route("/history/clear", post(handle_clear))
        .route("/health", get(handle_health))
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    prompt: String,
}

/// Handler for `POST /chat`.
///
/// Rejects empty/whitespace-only prompts with `400` before the pipeline
/// runs. Otherwise appends the user turn, runs the pipeline, appends and
/// returns the assistant turn.
async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatTurn>, AppError> {
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err(bad_request("prompt must not be empty"));
    }

    let mut session = state.session.lock().await;
    session.push(ChatTurn::user(prompt));

    let turn = query::answer(state.engine.as_ref(), prompt).await;
    session.push(turn.clone());

    Ok(Json(turn))
}

// ============ GET /history ============

#[derive(Serialize)]
struct HistoryResponse {
    turns: Vec<ChatTurn>,
}

async fn handle_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let session = state.session.lock().await;
    Json(HistoryResponse {
        turns: session.turns().to_vec(),
    })
}

// ============ POST /history/clear ============

#[derive(Serialize)]
struct ClearResponse {
    cleared: bool,
}

/// Empties the session history. No other side effects — the index is
/// untouched.
async fn handle_clear(State(state): State<AppState>) -> Json<ClearResponse> {
    let mut session = state.session.lock().await;
    session.clear();
    Json(ClearResponse { cleared: true })
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
