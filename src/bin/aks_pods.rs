//! # aks-pods
//!
//! Lists the pods of an AKS cluster with their IPs, one
//! `ip<TAB>namespace<TAB>name` line per pod.
//!
//! ```bash
//! TENANT_ID=... APP_ID=... PASSWD=... AKS_AAD_SERVER_ID=... \
//!   AKS_API_SERVER=contoso-dns-1a2b3c.hcp.eastus.azmk8s.io aks-pods --ca-cert ca.crt
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use workload_identity_samples::aks::{self, ClusterAccess, TlsOptions};
use workload_identity_samples::config::EnvSource;
use workload_identity_samples::observability::otel;
use workload_identity_samples::{runtime, LONG_VERSION};

/// AKS pod lister
#[derive(Parser, Debug)]
#[command(name = "aks-pods", version, long_version = LONG_VERSION)]
struct Cli {
    /// PEM CA bundle for the API server
    #[arg(long, env = "AKS_CA_CERT")]
    ca_cert: Option<PathBuf>,

    /// Do not verify the API server certificate
    #[arg(long)]
    insecure_skip_tls_verify: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    runtime::install_crypto_provider();
    let tracer_provider = otel::init_tracing("aks-pods", &EnvSource)?;

    let result = run(cli).await;
    otel::shutdown_tracing(tracer_provider);
    result
}

async fn run(cli: Cli) -> Result<()> {
    let access = ClusterAccess::from_source(&EnvSource).context("Invalid AKS configuration")?;
    let tls = TlsOptions {
        ca_cert: cli.ca_cert,
        insecure_skip_verify: cli.insecure_skip_tls_verify,
    };

    let client = aks::client(&access, &tls).await?;
    let count = aks::list_pods(client, &mut std::io::stdout()).await?;
    info!(count, "Listed pods");
    Ok(())
}
