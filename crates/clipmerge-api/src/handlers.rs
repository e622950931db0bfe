//! Request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use clipmerge_models::{MergeRequest, MergeResponse};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Service banner.
pub async fn root() -> &'static str {
    "clipmerge API is running"
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub ffmpeg_available: bool,
}

/// Liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        ffmpeg_available: state.pipeline.ffmpeg_available(),
    })
}

/// Merge the requested clips into one published video.
///
/// The run is spawned so that a client disconnect does not cancel it
/// midway; cleanup always finishes before the response is produced.
pub async fn merge_clips(
    State(state): State<AppState>,
    payload: Result<Json<MergeRequest>, JsonRejection>,
) -> ApiResult<Json<MergeResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    info!(clips = request.clips.len(), "Received merge request");

    let pipeline = state.pipeline.clone();
    let response = tokio::spawn(async move { pipeline.run(&request).await })
        .await
        .map_err(|e| {
            error!("Merge task failed: {}", e);
            ApiError::internal("merge task aborted")
        })??;

    Ok(Json(response))
}

/// Fallback for unknown routes.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Route not found" })),
    )
}
