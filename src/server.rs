//! HTTP gateway.
//!
//! Exposes the ingestion and question-answering pipelines as a JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest` | Multipart upload, field `file` |
//! | `POST` | `/chat` | `{"question": "..."}` → grounded answer |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Failures that are not part of a conversational answer use one shape:
//!
//! ```json
//! { "status": "error", "error": { "code": "empty_document", "message": "No readable text was found in this document." } }
//! ```
//!
//! `/chat` turns downstream faults into a `degraded` answer with HTTP 200; only
//! an empty question or malformed JSON is answered with 400.
//!
//! A panic while handling any request is caught per request and answered with
//! a 500 in the same shape (plus an apologetic `answer`); the server keeps
//! running.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends on
//! other origins can call the API.

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::answer::{answer_question, Answer};
use crate::clients::Clients;
use crate::config::Config;
use crate::error::{ErrorKind, RagError};
use crate::ingest::{ingest_upload, Upload};

const PANIC_ANSWER: &str = "Sorry, something went wrong while answering. Please try again.";

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    clients: Arc<Clients>,
}

/// Build the router with all routes and layers.
///
/// Exposed separately from [`run_server`] so callers can serve it on a
/// listener of their choosing.
pub fn build_router(config: Arc<Config>, clients: Arc<Clients>) -> Router {
    let body_limit = config.ingest.max_upload_bytes;
    let state = AppState { config, clients };

    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind `[server].bind` and serve until Ctrl-C.
pub async fn run_server(config: &Config, clients: Clients) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = build_router(Arc::new(config.clone()), Arc::new(clients));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::InvalidQuery => StatusCode::BAD_REQUEST,
            ErrorKind::ExtractionFailed | ErrorKind::EmptyDocument => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorKind::UpstreamUnavailable
            | ErrorKind::UpstreamRejected
            | ErrorKind::UpstreamTransient
            | ErrorKind::StoreRejected => StatusCode::BAD_GATEWAY,
            ErrorKind::StoreUnavailable | ErrorKind::CollectionMissing => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        Self::new(status, kind.code(), err.user_message())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: "error",
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Per-request guard: turns a handler panic into a structured 500.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "request handler panicked");

    let body = serde_json::json!({
        "status": "error",
        "answer": PANIC_ANSWER,
        "error": {
            "code": "internal",
            "message": "internal error while handling the request",
        },
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
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

// ============ POST /ingest ============

#[derive(Serialize)]
struct IngestResponse {
    status: &'static str,
    message: &'static str,
    collection: String,
    characters: usize,
    chunks: usize,
    ids: Vec<String>,
}

/// Handler for `POST /ingest`.
///
/// Reads the first multipart field named `file`; other fields are ignored.
async fn handle_ingest(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(e.status(), "bad_upload", e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::new(e.status(), "bad_upload", e.body_text()))?;
        upload = Some(Upload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload = upload
        .ok_or_else(|| AppError::new(StatusCode::BAD_REQUEST, "no_file", "No file uploaded"))?;

    let report = ingest_upload(&state.clients, &state.config, upload).await?;

    Ok(Json(IngestResponse {
        status: "success",
        message: "File processed!",
        collection: report.collection,
        characters: report.characters,
        chunks: report.chunks,
        ids: report.ids,
    }))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    question: String,
}

/// Handler for `POST /chat`.
async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let Json(request) = payload.map_err(|e| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            ErrorKind::InvalidQuery.code(),
            format!("Invalid JSON body: {}", e.body_text()),
        )
    })?;

    let answer = answer_question(&state.clients, &state.config, &request.question).await?;
    Ok(Json(answer))
}
