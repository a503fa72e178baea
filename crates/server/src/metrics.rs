//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the swarmcast server:
//! - HTTP request metrics (latency, counts)
//! - Swarm throughput and live session counts (collected dynamically)
//! - Core crawler, swarm, transcode and session metrics

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "swarmcast_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("swarmcast_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "swarmcast_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Swarm Metrics (collected dynamically)
// =============================================================================

pub static SWARM_DOWNLOAD_BYTES_PER_SEC: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "swarmcast_swarm_download_bytes_per_second",
        "Aggregate download rate across all live swarms",
    )
    .unwrap()
});

pub static SWARM_UPLOAD_BYTES_PER_SEC: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "swarmcast_swarm_upload_bytes_per_second",
        "Aggregate upload rate across all live swarms",
    )
    .unwrap()
});

/// Sessions listed by the manager, including ones still starting.
pub static SESSIONS_LISTED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "swarmcast_sessions_listed",
        "Stream sessions currently tracked by the session manager",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Swarm
    registry
        .register(Box::new(SWARM_DOWNLOAD_BYTES_PER_SEC.clone()))
        .unwrap();
    registry
        .register(Box::new(SWARM_UPLOAD_BYTES_PER_SEC.clone()))
        .unwrap();
    registry
        .register(Box::new(SESSIONS_LISTED.clone()))
        .unwrap();

    // Core metrics (crawlers, swarms, transcodes, sessions, companion streams)
    for metric in swarmcast_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the live swarm engine.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let throughput = state.engine().aggregate_throughput();
    SWARM_DOWNLOAD_BYTES_PER_SEC.set(throughput.download_bytes_per_sec as i64);
    SWARM_UPLOAD_BYTES_PER_SEC.set(throughput.upload_bytes_per_sec as i64);
    SESSIONS_LISTED.set(state.sessions().list().len() as i64);
}

static ID_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(stream|sessions|start-stream)/[^/]+").unwrap());
static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});
static HASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9a-fA-F]{40}").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
///
/// Content ids are free-form, so the segment after an id-bearing route is
/// always collapsed.
pub fn normalize_path(path: &str) -> String {
    let result = ID_SEGMENT.replace(path, "/$1/{id}");
    let result = UUID.replace_all(&result, "{id}");
    let result = HASH.replace_all(&result, "{hash}");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_stream_content_id() {
        assert_eq!(normalize_path("/stream/yts-interstellar-2014"), "/stream/{id}");
    }

    #[test]
    fn test_normalize_path_session_id() {
        let path = "/sessions/4f1c2d3e4a5b6c7d8e9f0a1b2c3d4e5f";
        assert_eq!(normalize_path(path), "/sessions/{id}");
    }

    #[test]
    fn test_normalize_path_companion_stream() {
        assert_eq!(normalize_path("/start-stream/streamlink-8090"), "/start-stream/{id}");
        assert_eq!(normalize_path("/start-stream"), "/start-stream");
    }

    #[test]
    fn test_normalize_path_stray_uuid_and_hash() {
        assert_eq!(
            normalize_path("/other/550e8400-e29b-41d4-a716-446655440000"),
            "/other/{id}"
        );
        assert_eq!(
            normalize_path("/other/a94a8fe5ccb19ba61c4c0873d391e987982fbbd3"),
            "/other/{hash}"
        );
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/search"), "/search");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("swarmcast_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        SWARM_DOWNLOAD_BYTES_PER_SEC.set(0);
        swarmcast_core::metrics::SESSIONS_ACTIVE.set(0);
        swarmcast_core::metrics::TRANSCODES_STARTED.inc_by(0);

        let output = encode_metrics();

        assert!(output.contains("swarmcast_http_request_duration_seconds"));
        assert!(output.contains("swarmcast_http_requests_in_flight"));
        assert!(output.contains("swarmcast_swarm_download_bytes_per_second"));
        assert!(output.contains("swarmcast_sessions_active"));
        assert!(output.contains("swarmcast_transcodes_started_total"));
    }
}
