//! # Ambient Identity
//!
//! Builds the `TokenCredential` every sample authenticates with.
//!
//! In AKS the pod's identity is ambient: Azure Workload Identity injects
//! `AZURE_FEDERATED_TOKEN_FILE` and `AZURE_CLIENT_ID` into the pod, and nodes
//! without it fall back to the VM's Managed Identity. Neither path embeds a
//! secret. Service Principal credentials are only used by the pod lister,
//! which talks to a cluster from outside.

use crate::config::{self, ConfigSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_core::credentials::{AccessToken, Secret, TokenCredential, TokenRequestOptions};
use azure_identity::{
    ClientSecretCredential, ManagedIdentityCredential, ManagedIdentityCredentialOptions,
    UserAssignedId, WorkloadIdentityCredential, WorkloadIdentityCredentialOptions,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info};

/// Mock TokenCredential for Pact testing
/// Returns a dummy token without attempting real Azure authentication
#[derive(Debug)]
pub struct MockTokenCredential;

#[async_trait]
impl TokenCredential for MockTokenCredential {
    async fn get_token(
        &self,
        _scopes: &[&str],
        _options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        use typespec_client_core::time::{Duration, OffsetDateTime};

        Ok(AccessToken::new(
            Secret::new("test-token".to_string()),
            OffsetDateTime::now_utc() + Duration::seconds(3600),
        ))
    }
}

/// How a sample proves who it is to Azure
#[derive(Debug, Clone)]
pub enum AmbientIdentity {
    /// Federated token projected into the pod by Azure Workload Identity
    WorkloadIdentity { client_id: Option<String> },
    /// IMDS-backed Managed Identity; `client_id` selects a user-assigned identity
    ManagedIdentity { client_id: Option<String> },
    /// Tenant/app/secret triple
    ServicePrincipal {
        tenant_id: String,
        client_id: String,
        client_secret: SecretString,
    },
    /// Static token, used when `PACT_MODE` is set
    Mock,
}

impl AmbientIdentity {
    /// Pick the ambient identity from the environment
    ///
    /// `PACT_MODE` wins, then Workload Identity when the federated token file
    /// is present, then Managed Identity.
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        if config::flag(source, "PACT_MODE") {
            return Self::Mock;
        }
        let client_id = config::optional(source, "AZURE_CLIENT_ID");
        if config::optional(source, "AZURE_FEDERATED_TOKEN_FILE").is_some() {
            Self::WorkloadIdentity { client_id }
        } else {
            Self::ManagedIdentity { client_id }
        }
    }

    /// Short label for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WorkloadIdentity { .. } => "workload-identity",
            Self::ManagedIdentity { .. } => "managed-identity",
            Self::ServicePrincipal { .. } => "service-principal",
            Self::Mock => "mock",
        }
    }

    /// Construct the SDK credential
    ///
    /// # Errors
    /// Returns an error if the SDK rejects the credential options
    pub fn credential(&self) -> Result<Arc<dyn TokenCredential>> {
        let credential: Arc<dyn TokenCredential> = match self {
            Self::WorkloadIdentity { client_id } => {
                info!(
                    client_id = client_id.as_deref().unwrap_or("<from AZURE_CLIENT_ID>"),
                    "Using Azure Workload Identity authentication"
                );
                let options = WorkloadIdentityCredentialOptions {
                    client_id: client_id.clone(),
                    ..Default::default()
                };
                WorkloadIdentityCredential::new(Some(options))
                    .context("Failed to create WorkloadIdentityCredential")?
            }
            Self::ManagedIdentity { client_id } => {
                info!(
                    client_id = client_id.as_deref().unwrap_or("<system-assigned>"),
                    "Using Managed Identity authentication"
                );
                let options = client_id.as_ref().map(|id| ManagedIdentityCredentialOptions {
                    user_assigned_id: Some(UserAssignedId::ClientId(id.clone())),
                    ..Default::default()
                });
                ManagedIdentityCredential::new(options)
                    .context("Failed to create ManagedIdentityCredential")?
            }
            Self::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
            } => {
                info!(tenant_id = %tenant_id, client_id = %client_id, "Using Service Principal authentication");
                ClientSecretCredential::new(
                    tenant_id,
                    client_id.clone(),
                    Secret::new(client_secret.expose_secret().to_string()),
                    None,
                )
                .context("Failed to create ClientSecretCredential")?
            }
            Self::Mock => {
                debug!("Pact mode: using mock Azure credential");
                Arc::new(MockTokenCredential)
            }
        };
        Ok(credential)
    }
}

/// Bearer token for `scope`
///
/// # Errors
/// Returns an error if the identity endpoint refuses or cannot be reached
pub async fn access_token(credential: &dyn TokenCredential, scope: &str) -> Result<String> {
    let token = credential
        .get_token(&[scope], Some(TokenRequestOptions::default()))
        .await
        .with_context(|| format!("Failed to get access token for {scope}"))?;
    Ok(token.token.secret().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapSource;

    #[test]
    fn test_pact_mode_selects_mock() {
        let source = MapSource::from([
            ("PACT_MODE", "true"),
            ("AZURE_FEDERATED_TOKEN_FILE", "/var/run/secrets/azure/tokens/azure-identity-token"),
        ]);
        assert!(matches!(AmbientIdentity::from_source(&source), AmbientIdentity::Mock));
    }

    #[test]
    fn test_federated_token_file_selects_workload_identity() {
        let source = MapSource::from([
            ("AZURE_FEDERATED_TOKEN_FILE", "/var/run/secrets/azure/tokens/azure-identity-token"),
            ("AZURE_CLIENT_ID", "12345678-1234-1234-1234-123456789012"),
        ]);
        match AmbientIdentity::from_source(&source) {
            AmbientIdentity::WorkloadIdentity { client_id } => {
                assert_eq!(client_id.as_deref(), Some("12345678-1234-1234-1234-123456789012"));
            }
            other => panic!("Expected WorkloadIdentity, got {}", other.kind()),
        }
    }

    #[test]
    fn test_default_is_system_assigned_managed_identity() {
        let identity = AmbientIdentity::from_source(&MapSource::new());
        match identity {
            AmbientIdentity::ManagedIdentity { client_id } => assert!(client_id.is_none()),
            other => panic!("Expected ManagedIdentity, got {}", other.kind()),
        }
    }

    #[test]
    fn test_service_principal_secret_is_redacted() {
        let identity = AmbientIdentity::ServicePrincipal {
            tenant_id: "tenant".to_string(),
            client_id: "app".to_string(),
            client_secret: SecretString::from("hunter2".to_string()),
        };
        assert!(!format!("{identity:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn test_mock_credential_token() {
        let credential = AmbientIdentity::Mock.credential().expect("mock credential");
        let token = access_token(credential.as_ref(), "https://servicebus.azure.net/.default")
            .await
            .expect("token");
        assert_eq!(token, "test-token");
    }
}
