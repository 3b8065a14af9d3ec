//! # Key Vault
//!
//! Secret retrieval from Azure Key Vault.
//!
//! - [`SecretStore`]: fetch a named secret, optionally pinned to a version
//! - [`client::KeyVaultSecretStore`]: the SDK-backed store, retrying with the
//!   SDK's exponential retry policy
//! - [`poller::SecretPoller`]: fetch and print the secret on an interval

pub mod client;
pub mod poller;

use crate::constants::KEY_VAULT_DNS_SUFFIX;
use anyhow::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

pub use client::{KeyVaultSecretStore, RetryPolicy};
pub use poller::{PollSummary, PollerSettings, SecretPoller};

/// A retrieved secret. `Debug` never shows the value.
#[derive(Clone)]
pub struct SecretValue {
    value: SecretString,
    version: Option<String>,
}

impl SecretValue {
    #[must_use]
    pub fn new(value: String, version: Option<String>) -> Self {
        Self {
            value: SecretString::from(value),
            version,
        }
    }

    /// The plaintext value
    #[must_use]
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Version that was served, when the vault reported one
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretValue")
            .field("value", &"[REDACTED]")
            .field("version", &self.version)
            .finish()
    }
}

/// Named, versioned secret lookup
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch `name`; `version` of `None` means the latest version
    async fn get_secret(&self, name: &str, version: Option<&str>) -> Result<SecretValue>;
}

#[async_trait]
impl<T: SecretStore + ?Sized> SecretStore for Arc<T> {
    async fn get_secret(&self, name: &str, version: Option<&str>) -> Result<SecretValue> {
        (**self).get_secret(name, version).await
    }
}

/// Vault URL for a vault name: `https://{name}.vault.azure.net/`
///
/// A value that is already an `https://` URL is returned unchanged.
#[must_use]
pub fn vault_url(vault_name: &str) -> String {
    if vault_name.starts_with("https://") {
        vault_name.to_string()
    } else {
        format!("https://{vault_name}.{KEY_VAULT_DNS_SUFFIX}/")
    }
}

/// Version segment of a secret id (`https://{vault}/secrets/{name}/{version}`)
pub(crate) fn version_from_id(id: &str) -> Option<String> {
    let mut segments = id.trim_end_matches('/').rsplit('/');
    let version = segments.next()?;
    let name = segments.next()?;
    let collection = segments.next()?;
    (collection == "secrets" && !name.is_empty() && !version.is_empty())
        .then(|| version.to_string())
}
