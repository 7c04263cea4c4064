// Axum API server module
//
// Purpose: identification endpoints over the reconciliation engine
// Usage: built with `--features api`, started by the api_server binary

#[cfg(feature = "api")]
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};

#[cfg(feature = "api")]
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};

#[cfg(feature = "api")]
use moka::future::Cache;

#[cfg(feature = "api")]
use futures::FutureExt;

#[cfg(feature = "api")]
use sha2::{Digest, Sha256};

#[cfg(feature = "api")]
use std::future::Future;

#[cfg(feature = "api")]
use std::panic::AssertUnwindSafe;

#[cfg(feature = "api")]
use std::path::Path;

#[cfg(feature = "api")]
use std::sync::Arc;

#[cfg(feature = "api")]
use std::time::Duration;

#[cfg(feature = "api")]
use crate::catalog::CatalogIndex;

#[cfg(feature = "api")]
use crate::config::ServerConfig;

#[cfg(feature = "api")]
use crate::identifier::{FixtureIdentifier, RetryingIdentifier, SpeciesIdentifier, UnconfiguredIdentifier};

#[cfg(feature = "api")]
use crate::model_output::candidate_from_value;

#[cfg(feature = "api")]
use crate::reconcile::ReconcileEngine;

#[cfg(feature = "api")]
use crate::types::{IdentificationInput, IdentifyRequest, IdentifyResponse, ReconcileRequest};

// ============================================================================
// Application State
// ============================================================================

#[cfg(feature = "api")]
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReconcileEngine>,
    pub identifier: Arc<dyn SpeciesIdentifier>,
    /// Identification responses keyed by request digest
    pub cache: Cache<String, IdentifyResponse>,
}

#[cfg(feature = "api")]
impl AppState {
    pub async fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        tracing::info!("Loading plant catalog from {}...", config.catalog_path);
        let catalog = if config.catalog_path.ends_with(".parquet") {
            CatalogIndex::from_parquet(&config.catalog_path).await?
        } else {
            CatalogIndex::from_json_file(Path::new(&config.catalog_path))?
        };
        let stats = catalog.stats();
        tracing::info!(
            "Catalog ready: {} plants, {} terms, {} FST bytes",
            stats.plant_count,
            stats.term_count,
            stats.fst_bytes
        );

        let identifier: Arc<dyn SpeciesIdentifier> = match &config.model_fixtures {
            Some(path) => {
                tracing::info!("Using model fixtures from {}", path);
                Arc::new(RetryingIdentifier::new(FixtureIdentifier::from_file(Path::new(path))?))
            }
            None => {
                tracing::warn!("No identification model configured; /api/identify will return no results");
                Arc::new(UnconfiguredIdentifier)
            }
        };

        let engine = ReconcileEngine::new(Arc::new(catalog), config.reconcile.clone());
        Ok(Self::with_parts(engine, identifier))
    }

    /// Assemble state from ready-made parts (tests, embedding)
    pub fn with_parts(engine: ReconcileEngine, identifier: Arc<dyn SpeciesIdentifier>) -> Self {
        tracing::info!("Initializing Moka cache...");
        let cache = Cache::builder()
            .max_capacity(10_000) // 10K entries
            .time_to_live(Duration::from_secs(300)) // 5 min TTL
            .build();

        Self {
            engine: Arc::new(engine),
            identifier,
            cache,
        }
    }
}

// ============================================================================
// Router
// ============================================================================

#[cfg(feature = "api")]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Identification endpoints
        .route("/api/identify", post(identify))
        .route("/api/identify/reconcile", post(reconcile_candidates))

        // Middleware (applied in reverse order)
        .layer(CompressionLayer::new()) // gzip + brotli compression
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http()) // Request logging
        .with_state(state)
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

#[cfg(feature = "api")]
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Identify a plant from an image or a description.
///
/// Model and catalog failures degrade to `{ "results": [] }`; only a
/// malformed request is a client error.
#[cfg(feature = "api")]
async fn identify(
    State(state): State<AppState>,
    payload: Result<Json<IdentifyRequest>, JsonRejection>,
) -> Result<Json<IdentifyResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let input = request
        .into_input()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let cache_key = cache_key(&input);

    // Check cache
    if let Some(cached) = state.cache.get(&cache_key).await {
        tracing::debug!("Cache hit for {} identification", input.kind());
        return Ok(Json(cached));
    }

    tracing::info!("Identifying plant from {}", input.kind());
    let engine = state.engine.clone();
    let identifier = state.identifier.clone();
    let results = guarded(async move { engine.identify(identifier.as_ref(), &input).await }).await?;

    let response = IdentifyResponse { results };

    // Empty lists may be transient model failures; don't pin them
    if !response.results.is_empty() {
        state.cache.insert(cache_key, response.clone()).await;
    }

    Ok(Json(response))
}

/// Reconcile candidates the caller already obtained from a model
#[cfg(feature = "api")]
async fn reconcile_candidates(
    State(state): State<AppState>,
    payload: Result<Json<ReconcileRequest>, JsonRejection>,
) -> Result<Json<IdentifyResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let raw: Vec<_> = request
        .candidates
        .iter()
        .filter_map(|value| {
            let candidate = candidate_from_value(value);
            if candidate.is_none() {
                tracing::warn!("Skipping non-object candidate: {}", value);
            }
            candidate
        })
        .collect();

    tracing::info!("Reconciling {} supplied candidates", raw.len());
    let engine = state.engine.clone();
    let results = guarded(async move { engine.reconcile(raw).await }).await?;

    Ok(Json(IdentifyResponse { results }))
}

/// Run reconciliation, turning a panic into a 500
#[cfg(feature = "api")]
async fn guarded<F, T>(work: F) -> Result<T, AppError>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(work).catch_unwind().await.map_err(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!("Reconciliation panicked: {}", message);
        AppError::Internal("Internal error during identification".to_string())
    })
}

#[cfg(feature = "api")]
fn cache_key(input: &IdentificationInput) -> String {
    let mut hasher = Sha256::new();
    match input {
        IdentificationInput::Image { data, mime_type } => {
            hasher.update(b"image\0");
            hasher.update(mime_type.as_deref().unwrap_or("").as_bytes());
            hasher.update(b"\0");
            hasher.update(data.as_bytes());
        }
        IdentificationInput::Description(text) => {
            hasher.update(b"description\0");
            hasher.update(text.to_lowercase().as_bytes());
        }
    }
    format!("identify:{:x}", hasher.finalize())
}

// ============================================================================
// Error Handling
// ============================================================================

#[cfg(feature = "api")]
#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Internal(String),
}

#[cfg(feature = "api")]
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
