//! Live transcoded video delivery.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use swarmcast_core::SessionError;
use tracing::{info, warn};

use super::handlers::error_response;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    /// Start offset in seconds on the media timeline.
    #[serde(default)]
    pub t: Option<u64>,
}

/// Status code for a session that failed before any byte was sent.
pub fn session_error_status(error: &SessionError) -> StatusCode {
    match error {
        SessionError::ContentNotFound(_)
        | SessionError::NoTorrentAvailable(_)
        | SessionError::NoPlayableFile => StatusCode::NOT_FOUND,
        SessionError::SwarmUnreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::TranscodeFailed(_)
        | SessionError::Cancelled
        | SessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// GET /stream/{id}?t=<seconds>
///
/// Starts a session and answers once transcoding has begun. If the client
/// goes away first, this future is dropped along with the pending session,
/// which cancels startup.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    Path(content_id): Path<String>,
    Query(params): Query<StreamParams>,
) -> Response {
    let start_offset = params.t.unwrap_or(0);
    let pending = state.sessions().create_session(&content_id, start_offset);
    let session_id = pending.id.clone();

    let stream = match pending.ready.await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            warn!(session_id = %session_id, content_id = %content_id, error = %e, "Stream startup failed");
            return error_response(session_error_status(&e), e.to_string()).into_response();
        }
        Err(_) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Session ended before streaming began",
            )
            .into_response()
        }
    };

    info!(session_id = %session_id, content_id = %content_id, "Streaming to client");
    (
        [
            (header::CONTENT_TYPE, "video/mp4"),
            (header::ACCEPT_RANGES, "bytes"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        [("x-session-id", session_id)],
        Body::from_stream(stream),
    )
        .into_response()
}
