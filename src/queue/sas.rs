//! # Shared Access Signatures
//!
//! Parses Service Bus connection strings and signs SAS tokens for them.
//!
//! A connection string looks like
//! `Endpoint=sb://{namespace}.servicebus.windows.net/;SharedAccessKeyName={rule};SharedAccessKey={key}[;EntityPath={queue}]`.
//! The token is `SharedAccessSignature sr={uri}&sig={sig}&se={expiry}&skn={rule}`
//! where `sig` is the base64 HMAC-SHA256 of `{uri}\n{expiry}` keyed with the
//! key's UTF-8 bytes (the key is not base64-decoded).

use crate::error::ServiceBusError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

/// RFC 3986 unreserved characters stay as-is, everything else is encoded
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Parsed Service Bus connection string
#[derive(Debug, Clone)]
pub struct ConnectionString {
    /// `https://` form of the namespace endpoint, without trailing slash
    pub endpoint: String,
    pub key_name: String,
    pub key: SecretString,
    pub entity_path: Option<String>,
}

impl ConnectionString {
    /// Parse a connection string; keys are case-insensitive
    ///
    /// # Errors
    /// Returns an error when `Endpoint`, `SharedAccessKeyName` or
    /// `SharedAccessKey` is missing
    pub fn parse(raw: &str) -> Result<Self, ServiceBusError> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        let mut entity_path = None;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Values (keys in particular) may contain '=' padding
            let Some((name, value)) = part.split_once('=') else {
                return Err(ServiceBusError::ConnectionString(format!(
                    "segment without '=': {part}"
                )));
            };
            let value = value.trim().to_string();
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value),
                "sharedaccesskeyname" => key_name = Some(value),
                "sharedaccesskey" => key = Some(value),
                "entitypath" => entity_path = Some(value).filter(|v| !v.is_empty()),
                _ => {}
            }
        }

        let endpoint = endpoint
            .ok_or_else(|| ServiceBusError::ConnectionString("missing Endpoint".to_string()))?;
        let key_name = key_name.ok_or_else(|| {
            ServiceBusError::ConnectionString("missing SharedAccessKeyName".to_string())
        })?;
        let key = key.ok_or_else(|| {
            ServiceBusError::ConnectionString("missing SharedAccessKey".to_string())
        })?;

        Ok(Self {
            endpoint: https_endpoint(&endpoint),
            key_name,
            key: SecretString::from(key),
            entity_path,
        })
    }
}

/// `sb://host/` becomes `https://host`
#[must_use]
pub fn https_endpoint(endpoint: &str) -> String {
    let host = endpoint
        .strip_prefix("sb://")
        .or_else(|| endpoint.strip_prefix("https://"))
        .unwrap_or(endpoint);
    format!("https://{}", host.trim_end_matches('/'))
}

/// Sign a SAS token for `resource_uri` valid until `expiry` (unix seconds)
///
/// # Errors
/// Returns an error if the key cannot initialise the HMAC
pub fn sign(
    resource_uri: &str,
    key_name: &str,
    key: &SecretString,
    expiry: i64,
) -> Result<String, ServiceBusError> {
    let encoded_uri = utf8_percent_encode(resource_uri, COMPONENT).to_string();
    let string_to_sign = format!("{encoded_uri}\n{expiry}");

    let mut mac = Hmac::<Sha256>::new_from_slice(key.expose_secret().as_bytes())
        .map_err(|e| ServiceBusError::Token(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!(
        "SharedAccessSignature sr={encoded_uri}&sig={}&se={expiry}&skn={}",
        utf8_percent_encode(&signature, COMPONENT),
        utf8_percent_encode(key_name, COMPONENT),
    ))
}
