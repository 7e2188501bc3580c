//! Axum routes for the inference service

use crate::error::ApiError;
use crate::types::{HealthResponse, PredictRequest, PredictResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use leafdoc_core::{DebugInfo, InferenceService};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Base64 inflates images by a third; 16 MiB leaves room for large phone photos.
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Shared, read-only request context
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<InferenceService>,
    pub body_limit: usize,
}

impl ApiState {
    pub fn new(service: Arc<InferenceService>) -> Self {
        Self {
            service,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}

/// Construct the router with all endpoints
pub fn api_router(state: ApiState) -> Router {
    let body_limit = state.body_limit;
    Router::new()
        .route("/health", get(health_check))
        .route("/debug", get(debug_info))
        .route("/predict", post(predict))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

async fn debug_info(State(state): State<Arc<ApiState>>) -> Json<DebugInfo> {
    Json(state.service.debug_info())
}

/// POST /predict
///
/// Decoding and the forward pass are CPU bound and run on the blocking pool.
async fn predict(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let result = run_prediction(&state, payload).await;
    if let Err(e) = &result {
        metrics::counter!("prediction_errors_total", "kind" => e.kind()).increment(1);
    }
    result
}

async fn run_prediction(
    state: &ApiState,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload?;
    let image = request
        .image
        .ok_or_else(|| ApiError::InvalidRequest("No image provided".to_string()))?;

    let service = state.service.clone();
    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || service.predict_base64(&image))
        .await
        .map_err(|e| ApiError::Internal(format!("prediction task failed: {e}")))??;
    let elapsed = start.elapsed().as_secs_f64();

    tracing::info!(
        disease = %result.label,
        confidence = result.confidence,
        severity = %result.severity,
        elapsed_ms = elapsed * 1000.0,
        "Prediction complete"
    );
    metrics::counter!("predictions_total",
        "disease" => result.label.clone(),
        "severity" => result.severity.as_str()
    )
    .increment(1);
    metrics::histogram!("inference_duration_seconds").record(elapsed);

    Ok(Json(result.into()))
}
