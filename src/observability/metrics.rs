//! # Metrics
//!
//! Prometheus metrics for the sample workloads.
//!
//! ## Metrics Exposed
//!
//! - `workload_samples_messages_processed_total` - Queue messages handled and completed
//! - `workload_samples_message_failures_total` - Queue messages whose handler failed (abandoned)
//! - `workload_samples_message_processing_duration_seconds` - Handler duration
//! - `workload_samples_secret_fetches_total` - Key Vault fetches, by outcome
//! - `workload_samples_secret_fetch_duration_seconds` - Key Vault fetch duration
//! - `workload_samples_catalog_rows_total` - Rows printed by the catalog reporter

use anyhow::Result;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static MESSAGES_PROCESSED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "workload_samples_messages_processed_total",
        "Total number of queue messages processed and completed",
    )
    .expect("Failed to create MESSAGES_PROCESSED_TOTAL metric - this should never happen")
});

static MESSAGE_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "workload_samples_message_failures_total",
        "Total number of queue messages abandoned after a handler failure",
    )
    .expect("Failed to create MESSAGE_FAILURES_TOTAL metric - this should never happen")
});

static MESSAGE_PROCESSING_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "workload_samples_message_processing_duration_seconds",
            "Duration of queue message handling in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
    )
    .expect("Failed to create MESSAGE_PROCESSING_DURATION metric - this should never happen")
});

static SECRET_FETCHES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "workload_samples_secret_fetches_total",
            "Total number of Key Vault secret fetches",
        ),
        &["outcome"],
    )
    .expect("Failed to create SECRET_FETCHES_TOTAL metric - this should never happen")
});

static SECRET_FETCH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "workload_samples_secret_fetch_duration_seconds",
            "Duration of Key Vault secret fetches in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 30.0, 60.0]),
    )
    .expect("Failed to create SECRET_FETCH_DURATION metric - this should never happen")
});

static CATALOG_ROWS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "workload_samples_catalog_rows_total",
        "Total number of catalog rows printed",
    )
    .expect("Failed to create CATALOG_ROWS_TOTAL metric - this should never happen")
});

/// Register all metrics with the shared registry
///
/// # Errors
/// Returns an error if a metric is registered twice
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(MESSAGES_PROCESSED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MESSAGE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MESSAGE_PROCESSING_DURATION.clone()))?;
    REGISTRY.register(Box::new(SECRET_FETCHES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRET_FETCH_DURATION.clone()))?;
    REGISTRY.register(Box::new(CATALOG_ROWS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_messages_processed() {
    MESSAGES_PROCESSED_TOTAL.inc();
}

pub fn increment_message_failures() {
    MESSAGE_FAILURES_TOTAL.inc();
}

pub fn observe_message_processing_duration(duration: f64) {
    MESSAGE_PROCESSING_DURATION.observe(duration);
}

/// Record a secret fetch; `outcome` is "success" or "error"
pub fn record_secret_fetch(outcome: &str, duration: f64) {
    SECRET_FETCHES_TOTAL.with_label_values(&[outcome]).inc();
    SECRET_FETCH_DURATION.observe(duration);
}

pub fn increment_catalog_rows() {
    CATALOG_ROWS_TOTAL.inc();
}

#[must_use]
pub fn messages_processed() -> u64 {
    MESSAGES_PROCESSED_TOTAL.get()
}

#[must_use]
pub fn message_failures() -> u64 {
    MESSAGE_FAILURES_TOTAL.get()
}
