//! # SQL Server Connector
//!
//! [`CatalogConnector`] over TDS (`tiberius`), authenticated with an AAD
//! access token for `https://database.windows.net/.default`.
//!
//! Azure SQL gateways may answer the login with a redirect to the node that
//! hosts the database; the connector follows one redirect.

use super::connection::{ConnectionSettings, SqlAuthentication};
use super::{CatalogConnection, CatalogConnector, CatalogRow, RowStream};
use crate::constants::AZURE_SQL_SCOPE;
use crate::credential::{self, AmbientIdentity};
use crate::error::CatalogError;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use tiberius::{Client, Config, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{info, info_span, warn, Instrument};

type TdsClient = Client<Compat<TcpStream>>;

/// Connects with the identity named by the connection string's
/// `Authentication`, falling back to the ambient identity
#[derive(Debug, Clone)]
pub struct MssqlConnector {
    connection_string: String,
    ambient: AmbientIdentity,
}

impl MssqlConnector {
    /// The connection string is parsed on [`CatalogConnector::connect`], so
    /// a malformed one is reported as a connection failure
    #[must_use]
    pub fn new(connection_string: &str, ambient: AmbientIdentity) -> Self {
        Self {
            connection_string: connection_string.to_string(),
            ambient,
        }
    }

    fn identity(&self, settings: &ConnectionSettings) -> AmbientIdentity {
        match (settings.authentication, &self.ambient) {
            (SqlAuthentication::ActiveDirectoryDefault, _) | (_, AmbientIdentity::Mock) => {
                self.ambient.clone()
            }
            (SqlAuthentication::ActiveDirectoryManagedIdentity, _) => {
                AmbientIdentity::ManagedIdentity {
                    client_id: settings.user_id.clone(),
                }
            }
            (SqlAuthentication::ActiveDirectoryWorkloadIdentity, ambient) => {
                let env_client_id = match ambient {
                    AmbientIdentity::WorkloadIdentity { client_id }
                    | AmbientIdentity::ManagedIdentity { client_id } => client_id.clone(),
                    _ => None,
                };
                AmbientIdentity::WorkloadIdentity {
                    client_id: settings.user_id.clone().or(env_client_id),
                }
            }
        }
    }

    async fn access_token(&self, settings: &ConnectionSettings) -> Result<String, CatalogError> {
        let identity = self.identity(settings);
        let credential = identity
            .credential()
            .map_err(|e| CatalogError::Connection(format!("{e:#}")))?;
        credential::access_token(credential.as_ref(), AZURE_SQL_SCOPE)
            .await
            .map_err(|e| CatalogError::Connection(format!("{e:#}")))
    }

    async fn open(&self, settings: &ConnectionSettings) -> Result<TdsClient, CatalogError> {
        info!(connection = %settings, "Opening SQL connection");
        let token = self.access_token(settings).await?;

        match login(settings.tds_config(token.clone())).await {
            Ok(client) => Ok(client),
            Err(tiberius::error::Error::Routing { host, port }) => {
                warn!(host = %host, port, "Server redirected the login");
                login(settings.redirected(&host, port).tds_config(token))
                    .await
                    .map_err(|e| CatalogError::Connection(e.to_string()))
            }
            Err(e) => Err(CatalogError::Connection(e.to_string())),
        }
    }
}

async fn login(config: Config) -> tiberius::Result<TdsClient> {
    let tcp = TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true)?;
    Client::connect(config, tcp.compat_write()).await
}

#[async_trait]
impl CatalogConnector for MssqlConnector {
    async fn connect(&self) -> Result<Box<dyn CatalogConnection>, CatalogError> {
        let settings = ConnectionSettings::parse(&self.connection_string)?;
        let span = info_span!("sql.connect", server.address = %settings.addr());
        let client = self.open(&settings).instrument(span).await?;
        Ok(Box::new(MssqlConnection { client }))
    }
}

/// An authenticated TDS session
struct MssqlConnection {
    client: TdsClient,
}

fn catalog_row(row: &Row) -> Result<CatalogRow, CatalogError> {
    let name: Option<&str> = row
        .try_get(0)
        .map_err(|e| CatalogError::Query(e.to_string()))?;
    let collation: Option<&str> = row
        .try_get(1)
        .map_err(|e| CatalogError::Query(e.to_string()))?;
    Ok(CatalogRow {
        name: name.unwrap_or_default().to_string(),
        collation: collation.map(str::to_string),
    })
}

#[async_trait]
impl CatalogConnection for MssqlConnection {
    async fn query<'a>(&'a mut self, sql: &'a str) -> Result<RowStream<'a>, CatalogError> {
        let stream = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| CatalogError::Query(e.to_string()))?;

        Ok(stream
            .into_row_stream()
            .map_err(|e| CatalogError::Query(e.to_string()))
            .and_then(|row| futures::future::ready(catalog_row(&row)))
            .boxed())
    }
}
