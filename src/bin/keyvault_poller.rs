//! # keyvault-poller
//!
//! Prints a Key Vault secret every few seconds until interrupted.
//!
//! ```bash
//! SECRET_NAME=db-password KEY_VAULT_NAME=contoso-kv keyvault-poller
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use workload_identity_samples::config::EnvSource;
use workload_identity_samples::credential::AmbientIdentity;
use workload_identity_samples::keyvault::{
    KeyVaultSecretStore, PollerSettings, RetryPolicy, SecretPoller,
};
use workload_identity_samples::observability::otel;
use workload_identity_samples::{runtime, LONG_VERSION};

/// Key Vault secret poller
#[derive(Parser, Debug)]
#[command(name = "keyvault-poller", version, long_version = LONG_VERSION)]
struct Cli {
    /// Seconds between fetches (overrides POLL_INTERVAL_SECS)
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    runtime::install_crypto_provider();
    let tracer_provider = otel::init_tracing("keyvault-poller", &EnvSource)?;

    let result = run(cli).await;
    otel::shutdown_tracing(tracer_provider);
    result
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings =
        PollerSettings::load(&EnvSource).context("Invalid Key Vault poller configuration")?;
    if let Some(secs) = cli.interval_secs {
        settings.poll_interval = Duration::from_secs(secs);
    }

    let identity = AmbientIdentity::from_source(&EnvSource);
    let store = KeyVaultSecretStore::new(
        &settings.vault_url(),
        identity.credential()?,
        RetryPolicy::default(),
    )?;

    let shutdown = CancellationToken::new();
    let _signal_listener = runtime::cancel_on_signal(shutdown.clone());

    let summary = SecretPoller::new(store, settings)
        .run(&mut std::io::stdout(), shutdown)
        .await?;
    info!(fetches = summary.fetches, "Poller exited");
    Ok(())
}
