//! Process-wide telemetry counters
//!
//! Prometheus collectors with init-on-first-use lifecycle. Names and
//! labels are a stable contract; teardown is not required. Telemetry
//! failures are never surfaced to callers.

use once_cell::sync::Lazy;
use prometheus::{
    exponential_buckets, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec,
};

/// Latency buckets from 0.1 ms to ~100 ms, logarithmic
fn latency_buckets() -> Vec<f64> {
    exponential_buckets(0.0001, 2.0, 11).expect("static bucket parameters are valid")
}

/// Applies, labeled by delta type and outcome status
pub static APPLY_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "crs_apply_total",
        "Total delta applies by type and status",
        &["delta_type", "status"]
    )
    .expect("metric registered once")
});

/// Snapshots taken
pub static SNAPSHOT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("crs_snapshot_total", "Total snapshots taken")
        .expect("metric registered once")
});

/// Records accepted by the delta-history worker
pub static DELTA_HISTORY_RECORDS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "crs_delta_history_records_total",
        "Total records accepted by the delta-history worker"
    )
    .expect("metric registered once")
});

/// Records dropped because the record queue was full
pub static DELTA_HISTORY_CHANNEL_FULL_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "crs_delta_history_channel_full_total",
        "Records dropped because the delta-history queue was full"
    )
    .expect("metric registered once")
});

/// Import failures by session and error type
pub static IMPORT_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "crs_import_errors_total",
        "Session import failures",
        &["session_id", "error_type"]
    )
    .expect("metric registered once")
});

/// Current store generation
pub static GENERATION: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("crs_generation", "Current store generation").expect("metric registered once")
});

/// Per-index entry counts
pub static INDEX_SIZE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!("crs_index_size", "Entries per index", &["index"])
        .expect("metric registered once")
});

/// Current journal size
pub static DELTA_HISTORY_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("crs_delta_history_size", "Records held by the delta-history worker")
        .expect("metric registered once")
});

/// Apply latency by delta type
pub static APPLY_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "crs_apply_duration_seconds",
        "Apply latency by delta type",
        &["delta_type"],
        latency_buckets()
    )
    .expect("metric registered once")
});

/// Session export latency
pub static EXPORT_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "crs_export_duration_seconds",
        "Session export latency",
        &["session_id"],
        latency_buckets()
    )
    .expect("metric registered once")
});

/// Session import latency
pub static IMPORT_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "crs_import_duration_seconds",
        "Session import latency",
        &["session_id"],
        latency_buckets()
    )
    .expect("metric registered once")
});

/// Journal query latency by query type
pub static DELTA_HISTORY_QUERY_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "crs_delta_history_query_duration_seconds",
        "Delta-history query latency",
        &["query_type"],
        latency_buckets()
    )
    .expect("metric registered once")
});
