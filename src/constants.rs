//! # Constants
//!
//! Shared constants used by the sample binaries.
//!
//! These values represent the defaults the samples were written against and
//! can be overridden via environment variables where applicable.

use std::time::Duration;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default Service Bus queue the trigger listens on
pub const DEFAULT_QUEUE_NAME: &str = "testqueue";

/// Simulated work per queue message (milliseconds)
pub const DEFAULT_PROCESSING_DELAY_MS: u64 = 100;

/// Long-poll timeout for a single Service Bus receive (seconds)
pub const DEFAULT_RECEIVE_TIMEOUT_SECS: u64 = 60;

/// Lifetime of a generated shared access signature (seconds)
pub const SAS_TOKEN_TTL_SECS: i64 = 3600;

/// Pause between secret fetches (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Key Vault client retry policy: first retry delay
pub const KEY_VAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Key Vault client retry policy: cap on a single retry delay
pub const KEY_VAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(16);

/// Key Vault client retry policy: number of retries after the first attempt
pub const KEY_VAULT_MAX_RETRIES: u32 = 5;

/// DNS suffix for Key Vault in the public cloud
pub const KEY_VAULT_DNS_SUFFIX: &str = "vault.azure.net";

/// AAD scopes
pub const SERVICE_BUS_SCOPE: &str = "https://servicebus.azure.net/.default";
pub const AZURE_SQL_SCOPE: &str = "https://database.windows.net/.default";

/// The catalog query issued by the reporter
pub const CATALOG_QUERY: &str = "SELECT name, collation_name FROM sys.databases";

/// Connection string the reporter falls back to when none is configured
pub const DEFAULT_SQL_CONNECTION_STRING: &str = "Server=<<<<INSERT SERVER FQDN>>>>; Authentication=Active Directory Default; Encrypt=True; Database=reddog";
