//! # Secret Poller
//!
//! Fetches one secret on a fixed interval and prints it:
//!
//! ```text
//! Retrieving your secret from {vault}.
//! Your secret is '{value}'.
//! ```
//!
//! The loop runs until the shutdown token is cancelled. A fetch failure ends
//! the loop with an error; retries happen inside the SDK client, not here.

use super::SecretStore;
use crate::config::{self, ConfigSource};
use crate::constants::DEFAULT_POLL_INTERVAL_SECS;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Poller settings, read once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerSettings {
    /// `SECRET_NAME`
    pub secret_name: String,
    /// `KEY_VAULT_NAME`: a vault name or an `https://` vault URL
    pub vault_name: String,
    /// `VERSION_ID`; `None` fetches the latest version
    pub version: Option<String>,
    /// `POLL_INTERVAL_SECS`
    pub poll_interval: Duration,
    /// `AZURE_KEY_VAULT_ENDPOINT`: replaces the vault URL (contract tests)
    pub endpoint_override: Option<String>,
}

impl PollerSettings {
    /// # Errors
    /// Returns an error if `SECRET_NAME` or `KEY_VAULT_NAME` is missing, or
    /// `POLL_INTERVAL_SECS` is not a number of seconds
    pub fn load(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        Ok(Self {
            secret_name: config::required(source, "SECRET_NAME")?,
            vault_name: config::required(source, "KEY_VAULT_NAME")?,
            version: config::optional(source, "VERSION_ID"),
            poll_interval: Duration::from_secs(config::parsed_or(
                source,
                "POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
            endpoint_override: config::optional(source, "AZURE_KEY_VAULT_ENDPOINT"),
        })
    }

    /// URL the client should talk to
    #[must_use]
    pub fn vault_url(&self) -> String {
        self.endpoint_override
            .clone()
            .unwrap_or_else(|| super::vault_url(&self.vault_name))
    }
}

/// Result of a poller run that ended by cancellation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Secrets fetched and printed
    pub fetches: u64,
}

/// Fetch-print-sleep loop over a [`SecretStore`]
#[derive(Debug)]
pub struct SecretPoller<S> {
    store: S,
    settings: PollerSettings,
}

impl<S: SecretStore> SecretPoller<S> {
    pub fn new(store: S, settings: PollerSettings) -> Self {
        Self { store, settings }
    }

    /// Poll until `shutdown` is cancelled, writing to `out`
    ///
    /// Each iteration performs exactly one fetch. Cancellation is observed
    /// during the fetch and during the sleep.
    ///
    /// # Errors
    /// Returns the first fetch error, or an error writing to `out`
    pub async fn run<W: Write + Send>(
        &self,
        out: &mut W,
        shutdown: CancellationToken,
    ) -> Result<PollSummary> {
        let mut summary = PollSummary::default();
        let name = self.settings.secret_name.as_str();
        let version = self.settings.version.as_deref();

        info!(
            secret.name = name,
            secret.version = version.unwrap_or("latest"),
            vault = %self.settings.vault_name,
            interval_secs = self.settings.poll_interval.as_secs(),
            "Starting secret poller"
        );

        while !shutdown.is_cancelled() {
            writeln!(out, "Retrieving your secret from {}.", self.settings.vault_name)?;
            out.flush()?;

            let secret = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                fetched = self.store.get_secret(name, version) => {
                    fetched.with_context(|| format!("Failed to retrieve secret '{name}'"))?
                }
            };

            writeln!(out, "Your secret is '{}'.", secret.expose())?;
            out.flush()?;
            summary.fetches += 1;
            debug!(fetches = summary.fetches, served_version = ?secret.version(), "Secret retrieved");

            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        info!(fetches = summary.fetches, "Secret poller stopped");
        Ok(summary)
    }
}
