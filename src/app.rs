//! HTTP API of the raster analysis service.

use crate::app_state::{AppState, SharedAppState};
use crate::cli::CommandLineArgs;
use crate::error::RasterAnalysisError;
use crate::metrics::{metrics_handler, record_response_metrics, request_counter};
use crate::models;
use crate::validated_json::ValidatedJson;

use axum::{
    body::BoxBody,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// `axum::Router` wrapped in a trailing slash normalisation layer.
pub type Service = NormalizePath<Router>;

/// Returns a [crate::app::Service] serving the analysis API.
///
/// The worker pool is built here, once, from the configured worker count.
pub fn service(args: &CommandLineArgs) -> Result<Service, RasterAnalysisError> {
    let state = Arc::new(AppState::new(args)?);
    Ok(NormalizePathLayer::trim_trailing_slash().layer(router(state)))
}

/// Returns the API router.
pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/operations", get(operations))
        .route("/metrics", get(metrics_handler))
        .layer(
            TraceLayer::new_for_http()
                .on_request(request_counter)
                .on_response(record_response_metrics::<BoxBody>),
        )
        .with_state(state)
}

/// Run the requested analysis over the dataset and return its result.
///
/// NaN or infinite pixel values are not filtered out, and they poison the mean. JSON has no
/// representation for a non-finite number, so such a result is returned as `null` with a
/// `200 OK` status.
async fn analyze(
    State(state): State<SharedAppState>,
    ValidatedJson(request): ValidatedJson<models::AnalysisRequest>,
) -> Result<Json<f64>, RasterAnalysisError> {
    info!("Received Request: {:?}", request);
    // The analysis blocks until the whole dataset has been read.
    let result =
        tokio::task::spawn_blocking(move || state.service.analyze(&request.name)).await??;
    info!("Response: {:.2}", result);
    Ok(Json(result))
}

/// List the supported analyses.
async fn operations(State(state): State<SharedAppState>) -> Json<Vec<String>> {
    Json(state.service.supported_operations())
}
