//! Prometheus metrics for tour-ledger-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// HTTP request counter by method, route and status.
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tour_ledger_http_requests_total",
        "Total number of HTTP requests",
        &["method", "route", "status"]
    )
    .expect("Failed to register http_requests_total")
});

/// HTTP request duration histogram by route.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "tour_ledger_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["route"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register http_request_duration")
});

/// Attachment uploads by attachment type and whether ledger rows were written.
pub static ATTACHMENTS_BOUND: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tour_ledger_attachments_bound_total",
        "Attachments uploaded, by type and ledger outcome",
        &["attachment_type", "ledger"] // ledger: bound, document_only, failed
    )
    .expect("Failed to register attachments_bound")
});

/// Attachment removals by outcome.
pub static ATTACHMENTS_UNBOUND: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tour_ledger_attachments_unbound_total",
        "Attachment removals by outcome",
        &["status"]
    )
    .expect("Failed to register attachments_unbound")
});

/// Blob removals that failed after the rows were deleted.
pub static BLOB_CLEANUP_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tour_ledger_blob_cleanup_failures_total",
        "Best-effort blob removals that failed",
        &["phase"] // unbind, orphaned_upload
    )
    .expect("Failed to register blob_cleanup_failures")
});

/// Writes issued by the schedule reconciler.
pub static RECONCILER_WRITES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tour_ledger_reconciler_writes_total",
        "Schedule reconciler decisions",
        &["frequency", "operation"] // insert, update, skip_confirmed
    )
    .expect("Failed to register reconciler_writes")
});

/// Confirmation code allocations.
pub static CONFIRMATION_CODES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tour_ledger_confirmation_codes_total",
        "Confirmation code allocations by outcome",
        &["status"] // assigned, conflict_retry, exhausted
    )
    .expect("Failed to register confirmation_codes")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tour_ledger_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "tour_ledger_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&HTTP_REQUEST_DURATION);
    Lazy::force(&ATTACHMENTS_BOUND);
    Lazy::force(&ATTACHMENTS_UNBOUND);
    Lazy::force(&BLOB_CLEANUP_FAILURES);
    Lazy::force(&RECONCILER_WRITES);
    Lazy::force(&CONFIRMATION_CODES);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Count an error by its taxonomy label.
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
