//! # Catalog Reporter
//!
//! Opens one SQL connection with ambient identity, runs a read-only catalog
//! query and prints each row.
//!
//! - `connection`: ADO.NET-style connection string parsing
//! - `mssql`: TDS connector authenticated with an AAD access token
//! - `reporter`: output formatting and the explicit [`CatalogOutcome`]

pub mod connection;
pub mod mssql;
pub mod reporter;

use crate::error::CatalogError;
use async_trait::async_trait;
use futures::stream::BoxStream;

pub use connection::{ConnectionSettings, SqlAuthentication};
pub use mssql::MssqlConnector;
pub use reporter::{wait_for_enter, CatalogReporter};

/// One row of `SELECT name, collation_name FROM sys.databases`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub name: String,
    /// NULL for databases that are offline or being created
    pub collation: Option<String>,
}

/// Lazily-read rows; each item is decoded as it arrives
pub type RowStream<'a> = BoxStream<'a, Result<CatalogRow, CatalogError>>;

/// How a reporter run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogOutcome {
    Succeeded { rows: u64 },
    ConnectionFailed(String),
    QueryFailed(String),
}

impl CatalogOutcome {
    /// Process exit status: 0 success, 2 connection failure, 3 query failure
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Succeeded { .. } => 0,
            Self::ConnectionFailed(_) => 2,
            Self::QueryFailed(_) => 3,
        }
    }
}

/// Opens connections
#[async_trait]
pub trait CatalogConnector: Send + Sync {
    /// Open and authenticate a new connection
    async fn connect(&self) -> Result<Box<dyn CatalogConnection>, CatalogError>;
}

/// An open connection; closed when dropped
#[async_trait]
pub trait CatalogConnection: Send {
    /// Run `sql`, returning its rows as a stream borrowing the connection
    async fn query<'a>(&'a mut self, sql: &'a str) -> Result<RowStream<'a>, CatalogError>;
}
