//! Prometheus metrics for core components.
//!
//! Covers crawlers, swarm joins, transcodes and the session lifecycle. The
//! server registers everything returned by [`all_metrics`] in its registry.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Crawlers
// =============================================================================

/// Crawler requests by source and result ("success", "error", "panic").
pub static CRAWLER_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("swarmcast_crawler_requests_total", "Total crawler requests"),
        &["source", "result"],
    )
    .unwrap()
});

/// Crawler request duration in seconds.
pub static CRAWLER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "swarmcast_crawler_duration_seconds",
            "Duration of a single crawler request",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["source"],
    )
    .unwrap()
});

/// Items returned per successful crawler request.
pub static CRAWLER_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "swarmcast_crawler_results",
            "Number of items returned per crawler request",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 20.0, 50.0]),
        &["source"],
    )
    .unwrap()
});

// =============================================================================
// Swarm
// =============================================================================

/// Time from join request to metadata, by result ("ready", "timeout", "error").
pub static SWARM_JOIN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "swarmcast_swarm_join_duration_seconds",
            "Time to join a swarm and receive metadata",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]),
        &["result"],
    )
    .unwrap()
});

/// Swarm handles destroyed.
pub static SWARMS_DESTROYED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "swarmcast_swarms_destroyed_total",
        "Total swarm handles destroyed",
    )
    .unwrap()
});

// =============================================================================
// Transcoding
// =============================================================================

/// Transcoder processes started.
pub static TRANSCODES_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "swarmcast_transcodes_started_total",
        "Total transcoder processes started",
    )
    .unwrap()
});

/// Transcoder terminal states ("completed", "failed", "killed").
pub static TRANSCODE_EXITS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "swarmcast_transcode_exits_total",
            "Transcoder processes by terminal state",
        ),
        &["state"],
    )
    .unwrap()
});

// =============================================================================
// Sessions
// =============================================================================

/// Sessions created.
pub static SESSIONS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "swarmcast_sessions_started_total",
        "Total stream sessions created",
    )
    .unwrap()
});

/// Sessions ended, by reason.
pub static SESSIONS_ENDED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("swarmcast_sessions_ended_total", "Stream sessions ended"),
        &["reason"],
    )
    .unwrap()
});

/// Sessions currently registered.
pub static SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("swarmcast_sessions_active", "Stream sessions currently live").unwrap()
});

// =============================================================================
// External player companion
// =============================================================================

/// Companion streams currently running.
pub static COMPANION_STREAMS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "swarmcast_companion_streams_active",
        "External player companion processes currently running",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Crawlers
        Box::new(CRAWLER_REQUESTS.clone()),
        Box::new(CRAWLER_DURATION.clone()),
        Box::new(CRAWLER_RESULTS.clone()),
        // Swarm
        Box::new(SWARM_JOIN_DURATION.clone()),
        Box::new(SWARMS_DESTROYED.clone()),
        // Transcoding
        Box::new(TRANSCODES_STARTED.clone()),
        Box::new(TRANSCODE_EXITS.clone()),
        // Sessions
        Box::new(SESSIONS_STARTED.clone()),
        Box::new(SESSIONS_ENDED.clone()),
        Box::new(SESSIONS_ACTIVE.clone()),
        // Companion
        Box::new(COMPANION_STREAMS_ACTIVE.clone()),
    ]
}
