//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the logdrop server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Upload batch and per-file outcomes
//! - Bytes stored

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

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
            "logdrop_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("logdrop_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "logdrop_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Upload Metrics
// =============================================================================

/// Upload batches by outcome.
pub static UPLOAD_BATCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("logdrop_upload_batches_total", "Upload batches by outcome"),
        &["outcome"], // "complete", "partial", "failed", "rejected"
    )
    .unwrap()
});

/// Uploaded files by outcome.
pub static UPLOAD_FILES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("logdrop_upload_files_total", "Uploaded files by outcome"),
        &["outcome"], // "stored" or an error kind
    )
    .unwrap()
});

/// Bytes written to disk.
pub static UPLOAD_BYTES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("logdrop_upload_bytes_total", "Total bytes stored").unwrap()
});

/// Time spent placing a batch.
pub static UPLOAD_PLACEMENT_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "logdrop_upload_placement_duration_seconds",
            "Duration of batch placement on disk",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]),
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

    // Uploads
    registry
        .register(Box::new(UPLOAD_BATCHES_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(UPLOAD_FILES_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(UPLOAD_BYTES_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(UPLOAD_PLACEMENT_DURATION.clone()))
        .unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
