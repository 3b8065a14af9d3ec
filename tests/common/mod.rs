//! Shared setup for the integration tests

#![allow(dead_code, reason = "not every test binary uses every helper")]

use std::sync::Once;
use workload_identity_samples::config::MapSource;

static RUSTLS_INIT: Once = Once::new();

/// Install the ring crypto provider once per test binary
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

/// Mock server base URL without the trailing slash
pub fn base_url(url: &impl ToString) -> String {
    url.to_string().trim_end_matches('/').to_string()
}

/// Settings a poller pod would get from its manifest
pub fn poller_env() -> MapSource {
    MapSource::from([
        ("SECRET_NAME", "db-password"),
        ("KEY_VAULT_NAME", "contoso-kv"),
        ("VERSION_ID", "4387e9f3d6e14c459867679a90fd0f79"),
        ("AZURE_CLIENT_ID", "12345678-1234-1234-1234-123456789012"),
        ("AZURE_FEDERATED_TOKEN_FILE", "/var/run/secrets/azure/tokens/azure-identity-token"),
    ])
}
