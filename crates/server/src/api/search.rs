//! Search and trending handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use swarmcast_core::{ContentItem, KindFilter};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    /// "movie" (default), "tv" or "all"; unrecognised values search everything.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Kept as text so a malformed value falls back instead of rejecting the request.
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

impl SearchParams {
    /// 1-based page; missing, zero or non-numeric means the first page.
    pub fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1)
    }

    /// Requested limit, if it parses; the aggregator clamps it.
    pub fn limit(&self) -> Option<usize> {
        self.limit.as_deref().and_then(|l| l.trim().parse().ok())
    }
}

/// GET /search
///
/// Aggregated, deduplicated and ranked results. Upstream failures degrade
/// to fewer (or no) results, never to an error.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<ContentItem>> {
    let kind = params
        .kind
        .as_deref()
        .map(KindFilter::parse)
        .unwrap_or_default();

    let results = state
        .aggregator()
        .search_all(params.q.trim(), kind, params.page(), params.limit())
        .await;
    Json(results)
}

/// GET /trending
///
/// What the sources list without a query.
pub async fn trending(State(state): State<Arc<AppState>>) -> Json<Vec<ContentItem>> {
    Json(state.aggregator().trending().await)
}
