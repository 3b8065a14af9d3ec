//! # Service Bus Queue Client
//!
//! Minimal client for the Service Bus REST API in peek-lock mode.
//!
//! - receive: `POST {namespace}/{queue}/messages/head?timeout={secs}`
//!   (201 with a message, 204 when the long poll expires empty)
//! - complete: `DELETE {namespace}/{queue}/messages/{message-id}/{lock-token}`
//! - abandon: `PUT {namespace}/{queue}/messages/{message-id}/{lock-token}`
//!
//! Lock metadata travels in the JSON `BrokerProperties` response header.

use super::{sas, QueueMessage, QueueReceiver};
use crate::constants::{SAS_TOKEN_TTL_SECS, SERVICE_BUS_SCOPE};
use crate::credential;
use crate::error::ServiceBusError;
use anyhow::Result;
use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH};
use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, Instrument};

/// Characters escaped inside a single path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// How requests are authorized
#[derive(Clone)]
pub enum ServiceBusAuth {
    /// Shared access key from a connection string
    SharedAccessKey { key_name: String, key: SecretString },
    /// AAD token for `https://servicebus.azure.net/.default`
    Credential(Arc<dyn TokenCredential>),
}

impl std::fmt::Debug for ServiceBusAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SharedAccessKey { key_name, .. } => f
                .debug_struct("SharedAccessKey")
                .field("key_name", key_name)
                .finish_non_exhaustive(),
            Self::Credential(_) => f.debug_tuple("Credential").finish(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BrokerProperties {
    message_id: String,
    lock_token: String,
    #[serde(default)]
    delivery_count: u32,
    #[serde(default)]
    sequence_number: Option<i64>,
}

/// Service Bus queue client
pub struct ServiceBusQueueClient {
    http: Client,
    endpoint: String,
    queue: String,
    auth: ServiceBusAuth,
    receive_timeout: Duration,
}

impl std::fmt::Debug for ServiceBusQueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBusQueueClient")
            .field("endpoint", &self.endpoint)
            .field("queue", &self.queue)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl ServiceBusQueueClient {
    /// Create a client for `queue` under `endpoint` (`https://{namespace}`)
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(
        endpoint: &str,
        queue: &str,
        auth: ServiceBusAuth,
        receive_timeout: Duration,
    ) -> Result<Self, ServiceBusError> {
        // The long poll must outlive the server-side timeout
        let http = Client::builder()
            .timeout(receive_timeout + Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            queue: queue.to_string(),
            auth,
            receive_timeout,
        })
    }

    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    fn queue_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.queue)
    }

    fn lock_url(&self, message: &QueueMessage) -> String {
        format!(
            "{}/messages/{}/{}",
            self.queue_url(),
            utf8_percent_encode(&message.message_id, PATH_SEGMENT),
            utf8_percent_encode(&message.lock_token, PATH_SEGMENT),
        )
    }

    async fn authorization(&self) -> Result<String, ServiceBusError> {
        match &self.auth {
            ServiceBusAuth::SharedAccessKey { key_name, key } => {
                let expiry = chrono::Utc::now().timestamp() + SAS_TOKEN_TTL_SECS;
                sas::sign(&self.queue_url(), key_name, key, expiry)
            }
            ServiceBusAuth::Credential(credential) => {
                let token = credential::access_token(credential.as_ref(), SERVICE_BUS_SCOPE)
                    .await
                    .map_err(|e| ServiceBusError::Token(format!("{e:#}")))?;
                Ok(format!("Bearer {token}"))
            }
        }
    }

    /// Receive and lock the next message
    ///
    /// # Errors
    /// Returns an error on transport failure or any status other than 201/204
    pub async fn receive_message(&self) -> Result<Option<QueueMessage>, ServiceBusError> {
        let span = tracing::debug_span!("servicebus.receive", queue = %self.queue);
        self.receive_locked().instrument(span).await
    }

    async fn receive_locked(&self) -> Result<Option<QueueMessage>, ServiceBusError> {
        let url = format!("{}/messages/head", self.queue_url());
        let response = self
            .http
            .post(&url)
            .query(&[("timeout", self.receive_timeout.as_secs().to_string())])
            .header(AUTHORIZATION, self.authorization().await?)
            .header(CONTENT_LENGTH, "0")
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                debug!("No message before receive timeout");
                Ok(None)
            }
            StatusCode::CREATED | StatusCode::OK => {
                let properties = response
                    .headers()
                    .get("BrokerProperties")
                    .ok_or_else(|| ServiceBusError::BrokerProperties("header missing".to_string()))?
                    .to_str()
                    .map_err(|e| ServiceBusError::BrokerProperties(e.to_string()))?;
                let properties: BrokerProperties = serde_json::from_str(properties)
                    .map_err(|e| ServiceBusError::BrokerProperties(e.to_string()))?;
                let body = response.bytes().await?;

                Ok(Some(QueueMessage {
                    message_id: properties.message_id,
                    lock_token: properties.lock_token,
                    delivery_count: properties.delivery_count,
                    sequence_number: properties.sequence_number,
                    body: String::from_utf8_lossy(&body).into_owned(),
                }))
            }
            status => Err(status_error("receive", status, response).await),
        }
    }

    /// Delete a locked message
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success status
    pub async fn complete_message(&self, message: &QueueMessage) -> Result<(), ServiceBusError> {
        let response = self
            .http
            .delete(self.lock_url(message))
            .header(AUTHORIZATION, self.authorization().await?)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error("complete", response.status(), response).await)
        }
    }

    /// Unlock a message for redelivery
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success status
    pub async fn abandon_message(&self, message: &QueueMessage) -> Result<(), ServiceBusError> {
        let response = self
            .http
            .put(self.lock_url(message))
            .header(AUTHORIZATION, self.authorization().await?)
            .header(CONTENT_LENGTH, "0")
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error("abandon", response.status(), response).await)
        }
    }
}

async fn status_error(
    operation: &'static str,
    status: StatusCode,
    response: reqwest::Response,
) -> ServiceBusError {
    ServiceBusError::Status {
        operation,
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    }
}

#[async_trait]
impl QueueReceiver for ServiceBusQueueClient {
    async fn receive(&self) -> Result<Option<QueueMessage>> {
        Ok(self.receive_message().await?)
    }

    async fn complete(&self, message: &QueueMessage) -> Result<()> {
        let span = info_span!("servicebus.complete", message.id = %message.message_id);
        Ok(self.complete_message(message).instrument(span).await?)
    }

    async fn abandon(&self, message: &QueueMessage) -> Result<()> {
        let span = info_span!("servicebus.abandon", message.id = %message.message_id);
        Ok(self.abandon_message(message).instrument(span).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ServiceBusQueueClient {
        ServiceBusQueueClient::new(
            "https://contoso.servicebus.windows.net/",
            "testqueue",
            ServiceBusAuth::SharedAccessKey {
                key_name: "listen".to_string(),
                key: SecretString::from("s3cr3t".to_string()),
            },
            Duration::from_secs(60),
        )
        .expect("client")
    }

    #[test]
    fn test_lock_url_escapes_segments() {
        let message = QueueMessage {
            message_id: "order/42".to_string(),
            lock_token: "5f1b2c3d-0000-4000-8000-000000000001".to_string(),
            delivery_count: 1,
            sequence_number: None,
            body: String::new(),
        };
        assert_eq!(
            client().lock_url(&message),
            "https://contoso.servicebus.windows.net/testqueue/messages/order%2F42/5f1b2c3d-0000-4000-8000-000000000001"
        );
    }

    #[test]
    fn test_broker_properties_parse() {
        let properties: BrokerProperties = serde_json::from_str(
            r#"{"DeliveryCount":2,"EnqueuedSequenceNumber":0,"LockToken":"lock-1","LockedUntilUtc":"Mon, 01 Jan 2024 00:01:00 GMT","MessageId":"msg-1","SequenceNumber":7,"State":"Active","TimeToLive":922337203685.47754}"#,
        )
        .expect("broker properties");
        assert_eq!(properties.message_id, "msg-1");
        assert_eq!(properties.lock_token, "lock-1");
        assert_eq!(properties.delivery_count, 2);
        assert_eq!(properties.sequence_number, Some(7));
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", client());
        assert!(rendered.contains("listen"));
        assert!(!rendered.contains("s3cr3t"));
    }
}
