//! Prometheus metrics for commission-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "commission_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Invoice counter by status.
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "commission_invoices_total",
        "Total number of invoices by status",
        &["status"] // draft, issued, paid, cancelled
    )
    .expect("Failed to register invoices_total")
});

/// Commission record counter by status.
pub static COMMISSIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "commission_records_total",
        "Total number of commission records by status",
        &["status"]
    )
    .expect("Failed to register commissions_total")
});

/// Invoice amount counter by status.
pub static INVOICE_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "commission_invoice_amount_total",
        "Total invoiced amount by status",
        &["status"]
    )
    .expect("Failed to register invoice_amount_total")
});

/// Numbering retry counter for alerting on sequence contention.
pub static NUMBERING_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "commission_numbering_retries_total",
        "Invoice number allocation retries by outcome",
        &["outcome"] // retried, exhausted
    )
    .expect("Failed to register numbering_retries_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&COMMISSIONS_TOTAL);
    Lazy::force(&INVOICE_AMOUNT_TOTAL);
    Lazy::force(&NUMBERING_RETRIES_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
