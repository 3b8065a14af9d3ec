//! # sqltest
//!
//! Connects to Azure SQL with ambient identity and prints the databases on
//! the server with their collations.
//!
//! Exit status: 0 on success, 2 when the connection fails, 3 when the query
//! fails.

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use workload_identity_samples::catalog::{wait_for_enter, CatalogReporter, MssqlConnector};
use workload_identity_samples::config::EnvSource;
use workload_identity_samples::constants::DEFAULT_SQL_CONNECTION_STRING;
use workload_identity_samples::credential::AmbientIdentity;
use workload_identity_samples::observability::otel;
use workload_identity_samples::{runtime, LONG_VERSION};

/// Azure SQL catalog query
#[derive(Parser, Debug)]
#[command(name = "sqltest", version, long_version = LONG_VERSION)]
struct Cli {
    /// ADO.NET connection string
    #[arg(
        long,
        env = "SQL_CONNECTION_STRING",
        default_value = DEFAULT_SQL_CONNECTION_STRING,
        hide_env_values = true
    )]
    connection_string: String,

    /// Exit without waiting for Enter
    #[arg(long)]
    no_wait: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    runtime::install_crypto_provider();
    let tracer_provider = otel::init_tracing("sqltest", &EnvSource)?;

    let connector = MssqlConnector::new(
        &cli.connection_string,
        AmbientIdentity::from_source(&EnvSource),
    );
    let outcome = CatalogReporter::new(connector)
        .run(&mut std::io::stdout())
        .await;

    otel::shutdown_tracing(tracer_provider);
    let outcome = outcome?;

    if !cli.no_wait {
        wait_for_enter(&mut std::io::stdin().lock())?;
    }
    Ok(ExitCode::from(outcome.exit_code()))
}
