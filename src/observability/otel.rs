//! # Tracing Setup
//!
//! Installs the process-wide tracing subscriber for a sample binary.
//!
//! When `DD_API_KEY` is present, tracing is exported to the Datadog Agent via
//! `datadog-opentelemetry`. Otherwise a `tracing-subscriber` fmt layer writes
//! to stderr, as text or JSON (`LOG_FORMAT=json`), filtered by `RUST_LOG`.
//!
//! Logs go to stderr so that stdout carries only the program's own output
//! (secret lines, catalog rows, pod listings).

use crate::config::{self, ConfigSource};
use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Tracer provider handle for graceful shutdown
#[derive(Debug)]
pub enum TracerProviderHandle {
    /// Datadog tracer provider (wraps opentelemetry_sdk::trace::SdkTracerProvider)
    Datadog(opentelemetry_sdk::trace::SdkTracerProvider),
}

/// Initialize tracing for `service_name`
///
/// Returns `Ok(Some(handle))` when Datadog export was set up; the handle must
/// be passed to [`shutdown_tracing`] before exit to flush spans.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed and Datadog
/// is not in use.
pub fn init_tracing(
    service_name: &str,
    source: &dyn ConfigSource,
) -> Result<Option<TracerProviderHandle>> {
    let handle = config::optional(source, "DD_API_KEY")
        .is_some()
        .then(|| init_datadog(service_name, source));

    // The binary's own target is named after it, with '-' mapped to '_'
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "workload_identity_samples=info,{}=info",
            service_name.replace('-', "_")
        )
        .into()
    });
    let json = config::optional(source, "LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    match (installed, &handle) {
        (Ok(()), None) => {}
        (Ok(()), Some(_)) => info!(
            service = %std::env::var("DD_SERVICE").unwrap_or_default(),
            version = %std::env::var("DD_VERSION").unwrap_or_default(),
            agent = %std::env::var("DD_TRACE_AGENT_URL").unwrap_or_default(),
            "Datadog OpenTelemetry tracing initialized"
        ),
        (Err(e), Some(_)) => {
            // datadog-opentelemetry may have installed its own subscriber
            warn!("Tracing subscriber init returned error (may already be initialized by Datadog): {e}");
        }
        (Err(e), None) => anyhow::bail!("Failed to install tracing subscriber: {e}"),
    }
    Ok(handle)
}

/// Initialize Datadog OpenTelemetry tracing
///
/// Fills in DD_SERVICE/DD_VERSION/DD_SITE/DD_TRACE_AGENT_URL defaults that are
/// not already set, then hands over to `datadog-opentelemetry`.
fn init_datadog(service_name: &str, source: &dyn ConfigSource) -> TracerProviderHandle {
    if config::optional(source, "DD_SERVICE").is_none() {
        std::env::set_var("DD_SERVICE", service_name);
    }
    if config::optional(source, "DD_VERSION").is_none() {
        std::env::set_var("DD_VERSION", crate::build_version());
    }
    if config::optional(source, "DD_SITE").is_none() {
        std::env::set_var("DD_SITE", "datadoghq.com");
    }
    if config::optional(source, "DD_TRACE_AGENT_URL").is_none() {
        std::env::set_var("DD_TRACE_AGENT_URL", "http://localhost:8126");
    }

    TracerProviderHandle::Datadog(datadog_opentelemetry::tracing().init())
}

/// Flush and shut down the tracer provider, if any
pub fn shutdown_tracing(tracer_provider: Option<TracerProviderHandle>) {
    if let Some(TracerProviderHandle::Datadog(provider)) = tracer_provider {
        info!("Shutting down Datadog tracer provider...");
        if let Err(e) = provider.shutdown_with_timeout(Duration::from_secs(5)) {
            warn!("Error shutting down Datadog tracer provider: {}", e);
        }
    }
}
