//! # svcbus-trigger
//!
//! Listens on a Service Bus queue and logs every message it receives.
//!
//! ```bash
//! SERVICEBUS_NAMESPACE=contoso svcbus-trigger
//! SERVICEBUS_CONNECTION='Endpoint=sb://...;EntityPath=testqueue' svcbus-trigger
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use workload_identity_samples::config::EnvSource;
use workload_identity_samples::credential::AmbientIdentity;
use workload_identity_samples::observability::{metrics, otel};
use workload_identity_samples::queue::{LoggingHandler, QueueTrigger, TriggerSettings};
use workload_identity_samples::server::{start_server, ServerState};
use workload_identity_samples::{runtime, LONG_VERSION};

/// Service Bus queue trigger
#[derive(Parser, Debug)]
#[command(name = "svcbus-trigger", version, long_version = LONG_VERSION)]
struct Cli {
    /// Queue to listen on (overrides SERVICEBUS_QUEUE)
    #[arg(long)]
    queue: Option<String>,

    /// Port for /metrics, /healthz and /readyz (overrides METRICS_PORT)
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    runtime::install_crypto_provider();
    let tracer_provider = otel::init_tracing("svcbus-trigger", &EnvSource)?;

    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %format!("{e:#}"), "Queue trigger failed");
    }

    otel::shutdown_tracing(tracer_provider);
    result
}

async fn run(cli: Cli) -> Result<()> {
    info!(version = LONG_VERSION, "Starting Service Bus queue trigger");

    let mut settings =
        TriggerSettings::load(&EnvSource).context("Invalid Service Bus trigger configuration")?;
    if let Some(queue) = cli.queue {
        settings.queue = queue;
    }
    if let Some(port) = cli.metrics_port {
        settings.metrics_port = port;
    }

    metrics::register_metrics()?;

    let shutdown = CancellationToken::new();
    let _signal_listener = runtime::cancel_on_signal(shutdown.clone());

    let state = Arc::new(ServerState::default());
    let server = tokio::spawn(start_server(
        settings.metrics_port,
        Arc::clone(&state),
        shutdown.clone(),
    ));

    let identity = AmbientIdentity::from_source(&EnvSource);
    let client = settings.client(&identity)?;
    info!(
        queue = %settings.queue,
        endpoint = %settings.endpoint(),
        processing_delay_ms = settings.processing_delay.as_millis(),
        "Listening for queue messages"
    );

    let trigger = QueueTrigger::new(client, LoggingHandler::new(settings.processing_delay));
    state.set_ready(true);
    let result = trigger.run(shutdown.clone()).await;
    state.set_ready(false);

    shutdown.cancel();
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("HTTP server error: {}", e),
        Err(e) => warn!("HTTP server task failed: {}", e),
    }

    let summary = result?;
    info!(
        processed = summary.processed,
        failed = summary.failed,
        "Queue trigger stopped"
    );
    Ok(())
}
