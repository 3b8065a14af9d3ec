//! # Key Vault Secret Store
//!
//! [`SecretStore`] backed by `azure_security_keyvault_secrets`.
//!
//! Transient failures (throttling, 5xx, timeouts) are retried by the SDK
//! pipeline with exponential backoff as configured by [`RetryPolicy`]. This
//! client makes exactly one logical call per fetch.

use super::{version_from_id, SecretStore, SecretValue};
use crate::constants::{KEY_VAULT_MAX_RETRIES, KEY_VAULT_RETRY_DELAY, KEY_VAULT_RETRY_MAX_DELAY};
use crate::observability::metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use azure_core::http::{ClientOptions, ExponentialRetryOptions, RetryOptions};
use azure_security_keyvault_secrets::models::Secret;
use azure_security_keyvault_secrets::{
    models::SecretClientGetSecretOptions, SecretClient, SecretClientOptions,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, Instrument};

/// Exponential retry settings handed to the SDK pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    /// 2 s initial delay, 16 s cap, 5 retries
    fn default() -> Self {
        Self {
            initial_delay: KEY_VAULT_RETRY_DELAY,
            max_delay: KEY_VAULT_RETRY_MAX_DELAY,
            max_retries: KEY_VAULT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// SDK client options carrying this policy
    ///
    /// # Errors
    /// Returns an error if a delay does not fit the SDK's duration type
    pub fn client_options(&self) -> Result<SecretClientOptions> {
        let retry = ExponentialRetryOptions {
            initial_delay: sdk_duration(self.initial_delay)?,
            max_delay: sdk_duration(self.max_delay)?,
            max_retries: self.max_retries,
            ..Default::default()
        };
        Ok(SecretClientOptions {
            client_options: ClientOptions {
                retry: RetryOptions::exponential(retry),
                ..Default::default()
            },
            ..Default::default()
        })
    }
}

fn sdk_duration(duration: Duration) -> Result<typespec_client_core::time::Duration> {
    typespec_client_core::time::Duration::try_from(duration)
        .with_context(|| format!("Retry delay {duration:?} is out of range"))
}

/// Azure Key Vault secret store
pub struct KeyVaultSecretStore {
    client: SecretClient,
    vault_url: String,
}

impl std::fmt::Debug for KeyVaultSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVaultSecretStore")
            .field("vault_url", &self.vault_url)
            .finish_non_exhaustive()
    }
}

impl KeyVaultSecretStore {
    /// Create a store for `vault_url` (see [`super::vault_url`])
    ///
    /// # Errors
    /// Returns an error if the SDK client cannot be created
    pub fn new(
        vault_url: &str,
        credential: Arc<dyn TokenCredential>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        debug!(vault_url = %vault_url, retry = ?retry, "Creating Key Vault client");
        let client = SecretClient::new(vault_url, credential, Some(retry.client_options()?))
            .context("Failed to create Azure Key Vault SecretClient")?;
        Ok(Self {
            client,
            vault_url: vault_url.to_string(),
        })
    }

    async fn fetch(&self, name: &str, version: Option<&str>) -> Result<SecretValue> {
        let options = SecretClientGetSecretOptions {
            secret_version: version.map(str::to_string),
            ..Default::default()
        };
        let response = self
            .client
            .get_secret(name, Some(options))
            .await
            .with_context(|| format!("Failed to get secret '{name}' from {}", self.vault_url))?;

        secret_value(name, &response.into_body())
    }
}

/// Map a `GET /secrets/{name}/{version}` body to a [`SecretValue`]
///
/// The served version is taken from the secret id.
fn secret_value(name: &str, body: &[u8]) -> Result<SecretValue> {
    let secret: Secret =
        serde_json::from_slice(body).context("Failed to deserialize Azure secret response")?;
    let value = secret
        .value
        .with_context(|| format!("Secret '{name}' has no value"))?;
    let served_version = secret.id.as_deref().and_then(version_from_id);

    Ok(SecretValue::new(value, served_version))
}

#[async_trait]
impl SecretStore for KeyVaultSecretStore {
    async fn get_secret(&self, name: &str, version: Option<&str>) -> Result<SecretValue> {
        let span = tracing::info_span!(
            "azure.keyvault.secret.get",
            secret.name = name,
            secret.version = version.unwrap_or("latest"),
            vault.url = %self.vault_url,
            operation.success = tracing::field::Empty,
        );
        let span_clone = span.clone();
        let start = Instant::now();

        async move {
            let result = self.fetch(name, version).await;
            let outcome = if result.is_ok() { "success" } else { "error" };
            span_clone.record("operation.success", result.is_ok());
            metrics::record_secret_fetch(outcome, start.elapsed().as_secs_f64());
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::MockTokenCredential;
    use serde_json::json;

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.initial_delay, Duration::from_secs(2));
        assert_eq!(policy.max_delay, Duration::from_secs(16));
        assert_eq!(policy.max_retries, 5);
    }

    #[test]
    fn test_client_options_accept_default_policy() {
        RetryPolicy::default()
            .client_options()
            .expect("default policy fits the SDK duration type");
    }

    fn response_body(body: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(body).expect("serialize body")
    }

    #[test]
    fn test_secret_value_from_response() {
        let body = response_body(&json!({
            "value": "s3cr3t-value",
            "id": "https://contoso-kv.vault.azure.net/secrets/db-password/4387e9f3d6e14c459867679a90fd0f79",
            "attributes": {
                "enabled": true,
                "created": 1_704_067_200,
                "updated": 1_704_067_200,
                "recoveryLevel": "Recoverable+Purgeable"
            },
            "tags": {}
        }));

        let secret = secret_value("db-password", &body).expect("secret");
        assert_eq!(secret.expose(), "s3cr3t-value");
        assert_eq!(secret.version(), Some("4387e9f3d6e14c459867679a90fd0f79"));
    }

    #[test]
    fn test_secret_without_id_has_no_version() {
        let body = response_body(&json!({ "value": "plain" }));
        let secret = secret_value("db-password", &body).expect("secret");
        assert_eq!(secret.expose(), "plain");
        assert_eq!(secret.version(), None);
    }

    #[test]
    fn test_secret_without_value_is_an_error() {
        let body = response_body(&json!({
            "id": "https://contoso-kv.vault.azure.net/secrets/db-password/abc123",
            "attributes": { "enabled": false }
        }));
        let err = secret_value("db-password", &body).expect_err("no value");
        assert!(err.to_string().contains("Secret 'db-password' has no value"));
    }

    #[test]
    fn test_malformed_body_is_an_error() {
        let err = secret_value("db-password", b"<html>Gateway Timeout</html>").expect_err("not json");
        assert!(err.to_string().contains("Failed to deserialize Azure secret response"));
    }

    #[test]
    fn test_debug_shows_vault_only() {
        let store = KeyVaultSecretStore::new(
            "https://contoso-kv.vault.azure.net/",
            Arc::new(MockTokenCredential),
            RetryPolicy::default(),
        )
        .expect("store");
        let rendered = format!("{store:?}");
        assert!(rendered.contains("contoso-kv.vault.azure.net"));
    }
}
