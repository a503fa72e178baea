//! External player companion handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use swarmcast_core::{CompanionStream, PlayerError};

use super::handlers::{error_response, ErrorResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartStreamRequest {
    pub url: String,
    #[serde(default)]
    pub quality: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QualitiesParams {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct QualitiesResponse {
    pub qualities: Vec<String>,
}

fn player_error(error: PlayerError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        PlayerError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        PlayerError::ToolNotFound { .. } | PlayerError::NoFreePort(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PlayerError::ProbeTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        PlayerError::ProbeFailed(_) => StatusCode::BAD_GATEWAY,
        PlayerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, error.to_string())
}

/// POST /start-stream
///
/// Re-serve a remote stream locally for an external player.
pub async fn start_stream(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartStreamRequest>,
) -> Result<(StatusCode, Json<CompanionStream>), impl IntoResponse> {
    state
        .stream_tool()
        .start_stream(&body.url, body.quality.as_deref())
        .await
        .map(|stream| (StatusCode::CREATED, Json(stream)))
        .map_err(player_error)
}

/// GET /start-stream
pub async fn list_streams(State(state): State<Arc<AppState>>) -> Json<Vec<CompanionStream>> {
    Json(state.stream_tool().list_streams())
}

/// DELETE /start-stream/{id}
pub async fn stop_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> StatusCode {
    state.stream_tool().stop_stream(&id).await;
    StatusCode::NO_CONTENT
}

/// GET /stream-qualities?url=
pub async fn list_qualities(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QualitiesParams>,
) -> Result<Json<QualitiesResponse>, impl IntoResponse> {
    state
        .stream_tool()
        .list_qualities(&params.url)
        .await
        .map(|qualities| Json(QualitiesResponse { qualities }))
        .map_err(player_error)
}
