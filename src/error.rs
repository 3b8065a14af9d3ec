//! # Errors
//!
//! Domain errors that callers match on. Application boundaries wrap these
//! (and SDK errors) in `anyhow::Error` with context.

use thiserror::Error;

/// Configuration could not be assembled from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required setting {0} is not set")]
    Missing(&'static str),
    #[error("setting {key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("either {0} or {1} must be set")]
    MissingOneOf(&'static str, &'static str),
}

/// Failure of the catalog reporter, split by phase
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("query failed: {0}")]
    Query(String),
}

/// Service Bus REST failures
#[derive(Debug, Error)]
pub enum ServiceBusError {
    #[error("invalid Service Bus connection string: {0}")]
    ConnectionString(String),
    #[error("Service Bus request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Service Bus returned {status} for {operation}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("malformed BrokerProperties header: {0}")]
    BrokerProperties(String),
    #[error("failed to acquire access token: {0}")]
    Token(String),
}
