//! JSON HTTP API over a shared [`VectorStore`].
//!
//! # Endpoints
//!
//! | Method   | Path       | Description |
//! |----------|------------|-------------|
//! | `GET`    | `/health`  | Health check (returns version) |
//! | `GET`    | `/stats`   | Record counts, dims, per-year breakdown |
//! | `POST`   | `/query`   | Top-k chunks with scores |
//! | `POST`   | `/context` | Top-k chunks formatted as LLM context |
//! | `POST`   | `/ask`     | Retrieval-augmented answer |
//! | `POST`   | `/ingest`  | Rebuild the index from the configured corpus |
//! | `DELETE` | `/index`   | Clear the index and delete the snapshot |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `embedding_failed` (502),
//! `persistence` (500), `internal` (500).
//!
//! # Concurrency
//!
//! The store sits behind a [`tokio::sync::RwLock`]. Read endpoints share the
//! read lock; `/ingest` and `DELETE /index` take the write lock, so there is
//! a single writer at a time.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};

use crate::answer::{answer_question, Answer, ChatModel};
use crate::config::Config;
use crate::context::format_context;
use crate::error::StoreError;
use crate::ingest::{ingest_corpus, IngestReport};
use crate::models::{keys, MetadataFilter, ScoredChunk};
use crate::store::{StoreStats, VectorStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<RwLock<VectorStore>>,
    /// `None` when `[llm]` is disabled; `/ask` then returns 400.
    pub chat: Option<Arc<dyn ChatModel>>,
}

impl AppState {
    pub fn new(config: Config, store: VectorStore, chat: Option<Arc<dyn ChatModel>>) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(RwLock::new(store)),
            chat,
        }
    }
}

/// Build the router without binding it.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .route("/query", post(handle_query))
        .route("/context", post(handle_context))
        .route("/ask", post(handle_ask))
        .route("/ingest", post(handle_ingest))
        .route("/index", delete(handle_clear))
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    println!("Server listening on http://{}", bind_addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let (status, code) = match &err {
            StoreError::Provider(_) => (StatusCode::BAD_GATEWAY, "embedding_failed"),
            StoreError::PersistenceWrite { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence")
            }
            StoreError::DimensionMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<StoreError>() {
            Ok(store_err) => store_err.into(),
            Err(other) => internal(format!("{:#}", other)),
        }
    }
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

// ============ GET /stats ============

async fn handle_stats(State(state): State<AppState>) -> Json<StoreStats> {
    Json(state.store.read().await.stats())
}

// ============ POST /query, /context, /ask ============

/// Request body shared by the retrieval endpoints.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub filter: Option<MetadataFilter>,
}

impl QueryRequest {
    fn validate(&self, default_top_k: usize) -> Result<(usize, Option<MetadataFilter>), AppError> {
        if self.query.trim().is_empty() {
            return Err(bad_request("query must not be empty"));
        }
        let top_k = self.top_k.unwrap_or(default_top_k);
        if top_k == 0 {
            return Err(bad_request("top_k must be >= 1"));
        }

        let mut filter = self.filter.clone();
        if let Some(year) = self.year {
            filter = Some(filter.unwrap_or_default().equals(keys::YEAR, year));
        }
        Ok((top_k, filter.filter(|f| !f.is_empty())))
    }
}

#[derive(Serialize)]
struct QueryResponse {
    results: Vec<ScoredChunk>,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let (top_k, filter) = req.validate(state.config.retrieval.top_k)?;
    let store = state.store.read().await;
    let results = store.search(&req.query, top_k, filter.as_ref()).await?;
    Ok(Json(QueryResponse { results }))
}

#[derive(Serialize)]
struct ContextResponse {
    context: String,
    sources: usize,
}

async fn handle_context(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<ContextResponse>, AppError> {
    let (top_k, filter) = req.validate(state.config.retrieval.top_k)?;
    let store = state.store.read().await;
    let chunks = store.query(&req.query, top_k, filter.as_ref()).await?;
    Ok(Json(ContextResponse {
        context: format_context(&chunks),
        sources: chunks.len(),
    }))
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Answer>, AppError> {
    let (top_k, filter) = req.validate(state.config.retrieval.top_k)?;
    let chat = state
        .chat
        .clone()
        .ok_or_else(|| bad_request("LLM provider is disabled"))?;
    let store = state.store.read().await;
    let answer =
        answer_question(&store, chat.as_ref(), &req.query, top_k, filter.as_ref()).await?;
    Ok(Json(answer))
}

// ============ POST /ingest, DELETE /index ============

async fn handle_ingest(State(state): State<AppState>) -> Result<Json<IngestReport>, AppError> {
    let corpus = state
        .config
        .corpus
        .as_ref()
        .ok_or_else(|| bad_request("no [corpus] configured"))?;
    let mut store = state.store.write().await;
    let report = ingest_corpus(&mut store, corpus, &state.config.chunking).await?;
    Ok(Json(report))
}

#[derive(Serialize)]
struct ClearResponse {
    cleared: bool,
}

async fn handle_clear(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    state.store.write().await.clear_index().await?;
    Ok(Json(ClearResponse { cleared: true }))
}
