//! # Connection Strings
//!
//! Parses the ADO.NET-style connection strings used for Azure SQL:
//!
//! ```text
//! Server=tcp:contoso.database.windows.net,1433; Authentication=Active Directory Default; Encrypt=True; Database=reddog
//! ```
//!
//! Keys are case-insensitive and may contain spaces (`Initial Catalog`).
//! Unknown keys are ignored. Only identity-based authentication modes are
//! accepted; connection strings never carry a password here.

use crate::error::CatalogError;
use std::fmt;
use tiberius::{AuthMethod, Config, EncryptionLevel};

/// Token-based authentication modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlAuthentication {
    /// Whatever ambient identity the environment provides
    #[default]
    ActiveDirectoryDefault,
    /// Managed Identity; `User Id` selects a user-assigned identity
    ActiveDirectoryManagedIdentity,
    /// Azure Workload Identity federated token
    ActiveDirectoryWorkloadIdentity,
}

impl SqlAuthentication {
    fn parse(raw: &str) -> Result<Self, CatalogError> {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "activedirectorydefault" => Ok(Self::ActiveDirectoryDefault),
            "activedirectorymanagedidentity" | "activedirectorymsi" => {
                Ok(Self::ActiveDirectoryManagedIdentity)
            }
            "activedirectoryworkloadidentity" => Ok(Self::ActiveDirectoryWorkloadIdentity),
            _ => Err(CatalogError::Connection(format!(
                "unsupported Authentication '{raw}'"
            ))),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::ActiveDirectoryDefault => "Active Directory Default",
            Self::ActiveDirectoryManagedIdentity => "Active Directory Managed Identity",
            Self::ActiveDirectoryWorkloadIdentity => "Active Directory Workload Identity",
        }
    }
}

/// Parsed connection string
///
/// Server, database, `Encrypt` and `TrustServerCertificate` are handled by
/// [`Config::from_ado_string`]; only the identity keys are read here.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    config: Config,
    pub authentication: SqlAuthentication,
    /// Client id of a user-assigned identity
    pub user_id: Option<String>,
}

impl ConnectionSettings {
    /// # Errors
    /// Returns [`CatalogError::Connection`] when the driver rejects the
    /// string or the authentication mode is unsupported
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let mut config = Config::from_ado_string(raw)
            .map_err(|e| CatalogError::Connection(format!("invalid connection string: {e}")))?;

        let mut authentication = SqlAuthentication::default();
        let mut user_id = None;
        let mut encrypt_set = false;

        for (key, value) in entries(raw) {
            match key.as_str() {
                "authentication" => authentication = SqlAuthentication::parse(value)?,
                "userid" | "uid" | "user" => user_id = Some(value.to_string()),
                "encrypt" => encrypt_set = true,
                _ => {}
            }
        }

        // Azure SQL clients encrypt unless told otherwise
        if !encrypt_set {
            config.encryption(EncryptionLevel::Required);
        }

        Ok(Self {
            config,
            authentication,
            user_id: user_id.filter(|u| !u.is_empty()),
        })
    }

    /// `host:port` the login goes to
    #[must_use]
    pub fn addr(&self) -> String {
        self.config.get_addr()
    }

    /// Same settings pointed at the node a gateway routed the login to
    #[must_use]
    pub fn redirected(&self, host: &str, port: u16) -> Self {
        let mut redirected = self.clone();
        redirected.config.host(host);
        redirected.config.port(port);
        redirected
    }

    /// Driver configuration that logs in with an AAD access token
    #[must_use]
    pub fn tds_config(&self, token: String) -> Config {
        let mut config = self.config.clone();
        config.authentication(AuthMethod::aad_token(token));
        config
    }
}

/// `key=value` pairs with keys lowercased and stripped of whitespace
fn entries(raw: &str) -> impl Iterator<Item = (String, &str)> {
    raw.split(';').filter_map(|part| {
        let (key, value) = part.split_once('=')?;
        let key = key
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        Some((key, value.trim()))
    })
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Server={}; Authentication={}",
            self.addr(),
            self.authentication.as_str()
        )?;
        if let Some(user_id) = &self.user_id {
            write!(f, "; User Id={user_id}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_SQL_CONNECTION_STRING;

    #[test]
    fn test_parse_default_connection_string() {
        let settings = ConnectionSettings::parse(DEFAULT_SQL_CONNECTION_STRING).expect("parse");
        assert_eq!(settings.addr(), "<<<<INSERT SERVER FQDN>>>>:1433");
        assert_eq!(settings.authentication, SqlAuthentication::ActiveDirectoryDefault);
        assert_eq!(settings.user_id, None);
    }

    #[test]
    fn test_parse_tcp_prefix_and_port() {
        let settings = ConnectionSettings::parse(
            "server=tcp:contoso.database.windows.net,11000;initial catalog=master;authentication=ActiveDirectoryMsi;user id=1111-2222",
        )
        .expect("parse");
        assert_eq!(settings.addr(), "contoso.database.windows.net:11000");
        assert_eq!(settings.authentication, SqlAuthentication::ActiveDirectoryManagedIdentity);
        assert_eq!(settings.user_id.as_deref(), Some("1111-2222"));
    }

    #[test]
    fn test_workload_identity_mode() {
        let settings = ConnectionSettings::parse(
            "Server=contoso.database.windows.net; Authentication = Active Directory Workload Identity; Encrypt=False",
        )
        .expect("parse");
        assert_eq!(settings.authentication, SqlAuthentication::ActiveDirectoryWorkloadIdentity);
        assert_eq!(settings.addr(), "contoso.database.windows.net:1433");
    }

    #[test]
    fn test_display_names_server_and_identity() {
        let settings = ConnectionSettings::parse(
            "Data Source=tcp:contoso.database.windows.net,1433;Database=reddog;Authentication=Active Directory Managed Identity;User Id=uami",
        )
        .expect("parse");
        assert_eq!(
            settings.to_string(),
            "Server=contoso.database.windows.net:1433; Authentication=Active Directory Managed Identity; User Id=uami"
        );
    }

    #[test]
    fn test_redirect_keeps_identity() {
        let settings = ConnectionSettings::parse(
            "Server=tcp:contoso.database.windows.net,1433;Authentication=Active Directory Managed Identity;User Id=uami",
        )
        .expect("parse");
        let redirected = settings.redirected("tr1.eastus1-a.worker.database.windows.net", 11003);

        assert_eq!(redirected.addr(), "tr1.eastus1-a.worker.database.windows.net:11003");
        assert_eq!(redirected.authentication, settings.authentication);
        assert_eq!(redirected.user_id, settings.user_id);
        assert_eq!(settings.addr(), "contoso.database.windows.net:1433");
    }

    #[test]
    fn test_parse_rejects_password_authentication() {
        let err = ConnectionSettings::parse("Server=x;Authentication=Sql Password")
            .expect_err("unsupported");
        assert!(err.to_string().contains("Sql Password"));
    }

    #[test]
    fn test_driver_rejects_invalid_boolean() {
        let err = ConnectionSettings::parse("Server=x;Encrypt=maybe").expect_err("not a boolean");
        assert!(matches!(err, CatalogError::Connection(_)));
        assert!(err.to_string().contains("invalid connection string"));
    }
}
