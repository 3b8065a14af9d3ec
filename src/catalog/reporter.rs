//! # Reporter
//!
//! Prints the catalog query result:
//!
//! ```text
//!
//! Query data example:
//! =========================================
//!
//! master	SQL_Latin1_General_CP1_CI_AS
//! reddog	SQL_Latin1_General_CP1_CI_AS
//!
//! Done. Press enter.
//! ```
//!
//! Rows are tab-separated, a NULL collation prints as an empty column. On
//! failure the error text replaces (or follows) the rows; the completion line
//! is printed either way.

use super::{CatalogConnector, CatalogOutcome};
use crate::constants::CATALOG_QUERY;
use crate::observability::metrics;
use futures::StreamExt;
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

const HEADER: &str = "\nQuery data example:\n=========================================\n";
const DONE: &str = "\nDone. Press enter.";

/// Runs the catalog query once per [`CatalogReporter::run`]
#[derive(Debug)]
pub struct CatalogReporter<C> {
    connector: C,
    query: String,
}

impl<C: CatalogConnector> CatalogReporter<C> {
    /// Reporter for `SELECT name, collation_name FROM sys.databases`
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            query: CATALOG_QUERY.to_string(),
        }
    }

    /// Connect, query, print every row, then print the completion line
    ///
    /// # Errors
    /// Only a failed write to `out` is an error; database failures are
    /// reported through the returned [`CatalogOutcome`]
    pub async fn run<W: Write + Send>(&self, out: &mut W) -> io::Result<CatalogOutcome> {
        writeln!(out, "{HEADER}")?;

        let outcome = self.report(out).await?;
        match &outcome {
            CatalogOutcome::Succeeded { rows } => info!(rows, "Catalog query complete"),
            CatalogOutcome::ConnectionFailed(message) | CatalogOutcome::QueryFailed(message) => {
                warn!(error = %message, exit_code = outcome.exit_code(), "Catalog query failed");
                writeln!(out, "{message}")?;
            }
        }

        writeln!(out, "{DONE}")?;
        out.flush()?;
        Ok(outcome)
    }

    async fn report<W: Write + Send>(&self, out: &mut W) -> io::Result<CatalogOutcome> {
        let mut connection = match self.connector.connect().await {
            Ok(connection) => connection,
            Err(e) => return Ok(CatalogOutcome::ConnectionFailed(e.to_string())),
        };

        let mut rows = match connection.query(&self.query).await {
            Ok(rows) => rows,
            Err(e) => return Ok(CatalogOutcome::QueryFailed(e.to_string())),
        };

        let mut printed = 0_u64;
        while let Some(row) = rows.next().await {
            match row {
                Ok(row) => {
                    writeln!(
                        out,
                        "{}\t{}",
                        row.name,
                        row.collation.as_deref().unwrap_or_default()
                    )?;
                    printed += 1;
                    metrics::increment_catalog_rows();
                }
                Err(e) => return Ok(CatalogOutcome::QueryFailed(e.to_string())),
            }
        }

        Ok(CatalogOutcome::Succeeded { rows: printed })
    }
}

/// Block until the operator presses Enter (or input closes)
///
/// # Errors
/// Returns an error if reading `input` fails
pub fn wait_for_enter<R: BufRead>(input: &mut R) -> io::Result<()> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(())
}
