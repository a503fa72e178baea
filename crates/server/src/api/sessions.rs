//! Session inspection handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use swarmcast_core::SessionSnapshot;

use super::handlers::error_response;
use crate::state::AppState;

/// GET /sessions
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSnapshot>> {
    Json(state.sessions().list())
}

/// GET /sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, impl IntoResponse> {
    state
        .sessions()
        .info(&id)
        .map(Json)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("Session not found: {}", id)))
}

/// DELETE /sessions/{id}
///
/// Always 204: stopping an unknown or already-ended session is a no-op.
pub async fn stop_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> StatusCode {
    state.sessions().stop_session(&id);
    StatusCode::NO_CONTENT
}
