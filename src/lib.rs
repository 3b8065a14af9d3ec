//! # Workload Identity Samples
//!
//! Small utilities showing how workloads on Azure Kubernetes Service
//! authenticate with ambient identity (Workload Identity or Managed
//! Identity) instead of embedded secrets.
//!
//! ## Binaries
//!
//! - `svcbus-trigger` - Service Bus queue trigger that logs each message
//! - `keyvault-poller` - prints a Key Vault secret on an interval
//! - `sqltest` - lists databases of an Azure SQL server
//! - `aks-pods` - lists the pods of an AKS cluster with their IPs
//!
//! ## Configuration
//!
//! Each binary reads its settings from environment variables (see
//! [`config`]) with `clap` flags for the few per-run options.

pub mod aks;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod credential;
pub mod error;
pub mod keyvault;
pub mod observability;
pub mod queue;
pub mod runtime;
pub mod server;

/// `--version` text for the binaries: package version, git hash and build time
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Version reported to Datadog: `{package version}-{git hash}`
#[must_use]
pub fn build_version() -> String {
    format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("BUILD_GIT_HASH"))
}
