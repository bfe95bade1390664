//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (batches, jobs, status polls)
//! - Health monitor (probe outcomes)
//! - Local engine (load attempts)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Batches started.
pub static BATCHES_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("conversio_batches_started_total", "Total conversion batches started")
        .unwrap()
});

/// Jobs that reached a terminal state, by backend and outcome.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("conversio_conversions_total", "Total file conversions"),
        &["backend", "outcome"], // outcome: "completed", "failed", "cancelled"
    )
    .unwrap()
});

/// Job duration in seconds, from upload start to terminal state.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "conversio_conversion_duration_seconds",
            "Duration of file conversions",
        )
        .buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["backend"],
    )
    .unwrap()
});

/// Status polls issued against the remote service.
pub static STATUS_POLLS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("conversio_status_polls_total", "Total remote status polls").unwrap()
});

/// Jobs left in the current batch, including the one in flight.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("conversio_queue_depth", "Jobs waiting or running in the current batch")
        .unwrap()
});

// =============================================================================
// Health Metrics
// =============================================================================

/// Health probes by resulting state.
pub static HEALTH_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("conversio_health_checks_total", "Total service health probes"),
        &["state"], // "healthy", "unhealthy", "unreachable", "unknown"
    )
    .unwrap()
});

// =============================================================================
// Engine Metrics
// =============================================================================

/// Engine load attempts by outcome (one per source tried).
pub static ENGINE_LOAD_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("conversio_engine_load_attempts_total", "Total engine load attempts"),
        &["outcome"], // "success", "failed", "timeout"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Orchestrator
        Box::new(BATCHES_STARTED.clone()),
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(STATUS_POLLS.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        // Health
        Box::new(HEALTH_CHECKS.clone()),
        // Engine
        Box::new(ENGINE_LOAD_ATTEMPTS.clone()),
    ]
}
