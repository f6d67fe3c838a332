//! HTTP query server.
//!
//! Exposes the question-answering engine over a small JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/query` | Answer a question, optionally within a session |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query_text must not be empty" } }
//! ```
//!
//! Validation failures return 400 with a descriptive message. Pipeline
//! failures return 500 with a generic message; details go to the server
//! log, not the client.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser
//! clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::answer::QueryEngine;
use crate::config::ServerConfig;

#[derive(Clone)]
struct AppState {
    engine: Arc<QueryEngine>,
}

/// Bind and serve until the process is terminated.
pub async fn run_server(config: &ServerConfig, engine: Arc<QueryEngine>) -> anyhow::Result<()> {
    let app = router(engine);

    println!("Query server listening on http://{}", config.bind);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(engine: Arc<QueryEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/query", post(handle_query))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { engine })
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

fn internal_error() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: "Query failed".to_string(),
    }
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    query_text: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct QueryResponse {
    response: String,
    sources: Vec<String>,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let query_text = request
        .query_text
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if query_text.is_empty() {
        return Err(bad_request("query_text must not be empty"));
    }
    if let Some(k) = request.top_k {
        if k == 0 {
            return Err(bad_request("top_k must be >= 1"));
        }
    }

    let answer = state
        .engine
        .answer(request.session_id.as_deref(), query_text, request.top_k)
        .await
        .map_err(|e| {
            error!(error = ?e, "Query failed");
            internal_error()
        })?;

    Ok(Json(QueryResponse {
        response: answer.response,
        sources: answer.sources,
    }))
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
