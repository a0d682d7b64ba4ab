//! Prometheus metrics for tuition-service.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "tuition_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Payments recorded, by ledger (student/faculty) and mode
pub static PAYMENTS_RECORDED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Receipts issued, by delivery channel (download/email)
pub static RECEIPTS_ISSUED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    PAYMENTS_RECORDED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "tuition_payments_recorded_total",
                "Total payments recorded by ledger and payment mode"
            ),
            &["ledger", "mode"]
        )
        .expect("Failed to register PAYMENTS_RECORDED_TOTAL")
    });

    RECEIPTS_ISSUED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "tuition_receipts_issued_total",
                "Total receipts issued by delivery channel"
            ),
            &["delivery"]
        )
        .expect("Failed to register RECEIPTS_ISSUED_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}

/// Record a payment.
pub fn record_payment_metric(ledger: &str, mode: &str) {
    if let Some(counter) = PAYMENTS_RECORDED_TOTAL.get() {
        counter.with_label_values(&[ledger, mode]).inc();
    }
}

/// Record an issued receipt.
pub fn record_receipt_issued(delivery: &str) {
    if let Some(counter) = RECEIPTS_ISSUED_TOTAL.get() {
        counter.with_label_values(&[delivery]).inc();
    }
}
