//! JSON HTTP retrieval server.
//!
//! Exposes the retrieval store to the chat and quiz backends. The store is
//! built (or loaded from a snapshot) once at startup and then served
//! read-only, so handlers share it through a plain `Arc` without locking.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/status` | Document counts, dimension, model, per-dataset breakdown |
//! | `POST` | `/retrieve` | k-NN search with optional metadata filter |
//! | `POST` | `/context` | Lesson-scoped context with relaxation fallback |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser frontend
//! can call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::{FieldValue, MetadataFilter, Retrieved};
use crate::store::{RetrievalStore, StoreStatus};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    /// Read-only after startup; handlers never mutate the store.
    store: Arc<RetrievalStore>,
}

/// Starts the retrieval HTTP server.
///
/// Loads the snapshot at `[store].snapshot` when one exists; otherwise
/// ingests the configured datasets and writes a fresh snapshot first. The
/// server then binds to `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = if RetrievalStore::snapshot_exists(&config.store.snapshot) {
        println!("Loading snapshot from {}", config.store.snapshot.display());
        RetrievalStore::load(&config.store.snapshot, config)?
    } else {
        println!(
            "No snapshot at {}; ingesting configured datasets",
            config.store.snapshot.display()
        );
        crate::ingest::run_ingest(config, None).await?;
        RetrievalStore::load(&config.store.snapshot, config)?
    };

    serve(config, Arc::new(store)).await
}

/// Serve an already-constructed store. Split from [`run_server`] so tests
/// can build the router around an in-memory store.
pub async fn serve(config: &Config, store: Arc<RetrievalStore>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = build_router(Arc::new(config.clone()), store);

    println!("Retrieval server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(config: Arc<Config>, store: Arc<RetrievalStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = AppState { config, store };

    Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/retrieve", post(handle_retrieve))
        .route("/context", post(handle_context))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 Internal Server Error.
fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: format!("{err:#}"),
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /status ============

async fn handle_status(State(state): State<AppState>) -> Json<StoreStatus> {
    Json(state.store.status())
}

// ============ POST /retrieve ============

/// JSON request body for `POST /retrieve`.
#[derive(Deserialize)]
struct RetrieveRequest {
    query: String,
    /// Result count; defaults to `[retrieval].default_k`.
    k: Option<usize>,
    /// Exact-match predicates: reserved keys plus arbitrary metadata fields.
    #[serde(default)]
    filter: FilterRequest,
}

/// Wire form of a metadata filter. Reserved keys are explicit; everything
/// else matches against the carried-through record fields.
#[derive(Deserialize, Default)]
struct FilterRequest {
    dataset_name: Option<String>,
    lesson_id: Option<String>,
    person_id: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, FieldValue>,
}

impl From<FilterRequest> for MetadataFilter {
    fn from(req: FilterRequest) -> Self {
        MetadataFilter {
            dataset_name: req.dataset_name,
            lesson_id: req.lesson_id,
            person_id: req.person_id,
            extra: req.extra,
        }
    }
}

/// JSON response body for `POST /retrieve`.
#[derive(Serialize)]
struct RetrieveResponse {
    results: Vec<Retrieved>,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    Json(req): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let k = req.k.unwrap_or(state.config.retrieval.default_k);
    let filter = MetadataFilter::from(req.filter);

    let results = state
        .store
        .retrieve(&req.query, k, &filter)
        .await
        .map_err(internal)?;
    Ok(Json(RetrieveResponse { results }))
}

// ============ POST /context ============

/// JSON request body for `POST /context`.
#[derive(Deserialize)]
struct ContextRequest {
    lesson_id: String,
    person_id: Option<String>,
    dataset_name: Option<String>,
    /// Optional retrieval query; defaults to a query naming the lesson.
    query: Option<String>,
    k: Option<usize>,
}

/// JSON response body for `POST /context`.
#[derive(Serialize)]
struct ContextResponse {
    /// Prompt-ready context, chunks joined by blank lines. Empty when the
    /// whole fallback cascade came up dry.
    context: String,
    /// Which scope produced the context: `"lesson_person"`, `"lesson"`,
    /// `"unfiltered"`, or `"none"`.
    scope: String,
}

/// Lesson context with progressive filter relaxation: lesson+person first,
/// then lesson only, then an unfiltered query. The first non-empty result
/// wins.
async fn handle_context(
    State(state): State<AppState>,
    Json(req): Json<ContextRequest>,
) -> Result<Json<ContextResponse>, AppError> {
    if req.lesson_id.trim().is_empty() {
        return Err(bad_request("lesson_id must not be empty"));
    }
    let k = req.k.unwrap_or(state.config.retrieval.default_k);
    let query = req.query.as_deref();
    let dataset = req.dataset_name.as_deref();
    let store = &state.store;

    if let Some(person) = req.person_id.as_deref() {
        let context = store
            .get_context_for_lesson(&req.lesson_id, Some(person), dataset, query, k)
            .await
            .map_err(internal)?;
        if !context.is_empty() {
            return Ok(Json(ContextResponse {
                context,
                scope: "lesson_person".to_string(),
            }));
        }
    }

    let context = store
        .get_context_for_lesson(&req.lesson_id, None, dataset, query, k)
        .await
        .map_err(internal)?;
    if !context.is_empty() {
        return Ok(Json(ContextResponse {
            context,
            scope: "lesson".to_string(),
        }));
    }

    // Last resort: plain similarity search over everything.
    let fallback_query = query.map(str::to_string).unwrap_or(req.lesson_id);
    let results = store
        .retrieve(&fallback_query, k, &MetadataFilter::default())
        .await
        .map_err(internal)?;
    let context = results
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let scope = if context.is_empty() { "none" } else { "unfiltered" };
    Ok(Json(ContextResponse {
        context,
        scope: scope.to_string(),
    }))
}
