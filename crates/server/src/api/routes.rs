use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, middleware::metrics_middleware, player, search, sessions, stream};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // Discovery
        .route("/search", get(search::search))
        .route("/trending", get(search::trending))
        // Streaming
        .route("/stream/{id}", get(stream::stream))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/{id}", get(sessions::get_session))
        .route("/sessions/{id}", delete(sessions::stop_session))
        // External player companion
        .route("/start-stream", post(player::start_stream))
        .route("/start-stream", get(player::list_streams))
        .route("/start-stream/{id}", delete(player::stop_stream))
        .route("/stream-qualities", get(player::list_qualities))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        // The video element on another origin must be able to fetch streams.
        .layer(CorsLayer::permissive())
        .with_state(state)
}
