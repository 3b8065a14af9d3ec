//! # Observability
//!
//! Observability modules for metrics and tracing.
//!
//! - `metrics`: Prometheus metrics collection
//! - `otel`: tracing subscriber setup with optional Datadog export

pub mod metrics;
pub mod otel;
