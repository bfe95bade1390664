//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the Conversio server:
//! - HTTP request metrics (latency, counts)
//! - Orchestrator and engine state (collected dynamically)
//! - Everything registered by the core library

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::state::AppState;

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
            "conversio_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("conversio_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "conversio_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// State Gauges
// =============================================================================

/// 1 while a batch is running.
pub static BATCH_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("conversio_batch_running", "Whether a conversion batch is running")
        .unwrap()
});

/// Completed records held in the current history.
pub static COMPLETED_RECORDS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "conversio_completed_records",
        "Number of completed records in the current history",
    )
    .unwrap()
});

/// 1 when the conversion backend is ready to accept a batch.
pub static BACKEND_READY: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "conversio_backend_ready",
        "Whether the conversion backend accepts new batches",
    )
    .unwrap()
});

/// 1 when the local engine is loaded.
pub static ENGINE_LOADED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("conversio_engine_loaded", "Whether the local engine is loaded").unwrap()
});

fn register_metrics(registry: &Registry) {
    // HTTP metrics
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // State gauges
    registry.register(Box::new(BATCH_RUNNING.clone())).unwrap();
    registry
        .register(Box::new(COMPLETED_RECORDS.clone()))
        .unwrap();
    registry.register(Box::new(BACKEND_READY.clone())).unwrap();
    registry.register(Box::new(ENGINE_LOADED.clone())).unwrap();

    // Core metrics (orchestrator, health, engine)
    for metric in conversio_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// This is called before encoding metrics to update gauges with current values.
pub fn collect_dynamic_metrics(state: &AppState) {
    let orchestrator = state.orchestrator();
    let snapshot = orchestrator.snapshot();

    BATCH_RUNNING.set(i64::from(orchestrator.is_processing()));
    COMPLETED_RECORDS.set(snapshot.completed.len() as i64);
    BACKEND_READY.set(i64::from(orchestrator.can_start()));

    if let Some(engine) = state.engine() {
        ENGINE_LOADED.set(i64::from(engine.is_loaded()));
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    // Replace UUIDs and long numbers with placeholders
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();
    let numeric_regex = regex_lite::Regex::new(r"/\d+(/|$)").unwrap();

    let result = uuid_regex.replace_all(path, "{id}");
    let result = numeric_regex.replace_all(&result, "/{id}$1");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/api/v1/conversions/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/api/v1/conversions/{id}");
    }

    #[test]
    fn test_normalize_path_numeric_middle() {
        let path = "/api/v1/conversions/12345/cancel";
        assert_eq!(normalize_path(path), "/api/v1/conversions/{id}/cancel");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        let path = "/api/v1/health";
        assert_eq!(normalize_path(path), "/api/v1/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        // Access metrics to ensure they're initialized
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("conversio_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        // Prometheus only outputs vectors that have at least one label set
        conversio_core::metrics::STATUS_POLLS.inc();
        conversio_core::metrics::CONVERSIONS_TOTAL
            .with_label_values(&["remote", "completed"])
            .inc();
        BATCH_RUNNING.set(0);
        ENGINE_LOADED.set(0);

        let output = encode_metrics();
        assert!(output.contains("conversio_status_polls_total"));
        assert!(output.contains("conversio_conversions_total"));
        assert!(output.contains("conversio_batch_running"));
        assert!(output.contains("conversio_engine_loaded"));
    }
}
