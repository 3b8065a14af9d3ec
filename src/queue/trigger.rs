//! # Trigger Host
//!
//! Receives messages in peek-lock mode and invokes a [`MessageHandler`] once
//! per message. A handled message is completed; a handler error abandons it,
//! leaving redelivery and dead-lettering to the broker's own policy.
//!
//! A receive error ends the loop with an error so the pod restarts. Settlement
//! errors are logged only: the lock expires and the broker redelivers.

use super::sas::{self, ConnectionString};
use super::servicebus::{ServiceBusAuth, ServiceBusQueueClient};
use super::{MessageHandler, QueueMessage, QueueReceiver};
use crate::config::{self, ConfigSource};
use crate::constants::{
    DEFAULT_METRICS_PORT, DEFAULT_PROCESSING_DELAY_MS, DEFAULT_QUEUE_NAME,
    DEFAULT_RECEIVE_TIMEOUT_SECS,
};
use crate::credential::AmbientIdentity;
use crate::error::ConfigError;
use crate::observability::metrics;
use anyhow::{Context, Result};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Public cloud Service Bus DNS suffix, appended to bare namespace names
const SERVICE_BUS_DNS_SUFFIX: &str = "servicebus.windows.net";

/// Where the queue lives and how to authenticate to it
#[derive(Debug, Clone)]
pub enum ServiceBusConnection {
    /// `SERVICEBUS_CONNECTION`: shared access key
    ConnectionString(ConnectionString),
    /// `SERVICEBUS_NAMESPACE`: ambient identity
    Namespace(String),
}

/// Trigger host settings
#[derive(Debug, Clone)]
pub struct TriggerSettings {
    pub queue: String,
    pub connection: ServiceBusConnection,
    /// Replaces the namespace endpoint, e.g. a local emulator or mock server
    pub endpoint_override: Option<String>,
    pub processing_delay: Duration,
    pub receive_timeout: Duration,
    pub metrics_port: u16,
}

impl TriggerSettings {
    /// Load settings from `source`
    ///
    /// The queue is `SERVICEBUS_QUEUE`, else the connection string's
    /// `EntityPath`, else `testqueue`.
    ///
    /// # Errors
    /// Returns an error when neither `SERVICEBUS_CONNECTION` nor
    /// `SERVICEBUS_NAMESPACE` is set, or a value does not parse
    pub fn load(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let connection = if let Some(raw) = config::optional(source, "SERVICEBUS_CONNECTION") {
            let parsed = ConnectionString::parse(&raw).map_err(|e| ConfigError::Invalid {
                key: "SERVICEBUS_CONNECTION",
                value: "<redacted>".to_string(),
                reason: e.to_string(),
            })?;
            ServiceBusConnection::ConnectionString(parsed)
        } else if let Some(namespace) = config::optional(source, "SERVICEBUS_NAMESPACE") {
            ServiceBusConnection::Namespace(namespace)
        } else {
            return Err(ConfigError::MissingOneOf(
                "SERVICEBUS_CONNECTION",
                "SERVICEBUS_NAMESPACE",
            ));
        };

        let entity_path = match &connection {
            ServiceBusConnection::ConnectionString(c) => c.entity_path.clone(),
            ServiceBusConnection::Namespace(_) => None,
        };
        let queue = config::optional(source, "SERVICEBUS_QUEUE")
            .or(entity_path)
            .unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string());

        Ok(Self {
            queue,
            connection,
            endpoint_override: config::optional(source, "SERVICEBUS_ENDPOINT"),
            processing_delay: Duration::from_millis(config::parsed_or(
                source,
                "PROCESSING_DELAY_MS",
                DEFAULT_PROCESSING_DELAY_MS,
            )?),
            receive_timeout: Duration::from_secs(config::parsed_or(
                source,
                "RECEIVE_TIMEOUT_SECS",
                DEFAULT_RECEIVE_TIMEOUT_SECS,
            )?),
            metrics_port: config::parsed_or(source, "METRICS_PORT", DEFAULT_METRICS_PORT)?,
        })
    }

    /// Namespace endpoint, `https://{namespace}` unless overridden
    #[must_use]
    pub fn endpoint(&self) -> String {
        if let Some(endpoint) = &self.endpoint_override {
            return endpoint.trim_end_matches('/').to_string();
        }
        match &self.connection {
            ServiceBusConnection::ConnectionString(c) => c.endpoint.clone(),
            ServiceBusConnection::Namespace(namespace) if namespace.contains('.') => {
                sas::https_endpoint(namespace)
            }
            ServiceBusConnection::Namespace(namespace) => {
                format!("https://{namespace}.{SERVICE_BUS_DNS_SUFFIX}")
            }
        }
    }

    /// Build the queue client; `identity` is only used for namespace connections
    ///
    /// # Errors
    /// Returns an error if the credential or HTTP client cannot be created
    pub fn client(&self, identity: &AmbientIdentity) -> Result<ServiceBusQueueClient> {
        let auth = match &self.connection {
            ServiceBusConnection::ConnectionString(c) => ServiceBusAuth::SharedAccessKey {
                key_name: c.key_name.clone(),
                key: c.key.clone(),
            },
            ServiceBusConnection::Namespace(_) => {
                info!(identity = identity.kind(), "Authenticating to Service Bus with ambient identity");
                ServiceBusAuth::Credential(identity.credential()?)
            }
        };
        ServiceBusQueueClient::new(&self.endpoint(), &self.queue, auth, self.receive_timeout)
            .context("Failed to create Service Bus client")
    }
}

/// Counts for one run of the trigger host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerSummary {
    /// Handled and completed
    pub processed: u64,
    /// Handler failed, message abandoned
    pub failed: u64,
}

/// Receive loop dispatching each message to a handler
#[derive(Debug)]
pub struct QueueTrigger<R, H> {
    receiver: R,
    handler: H,
}

impl<R: QueueReceiver, H: MessageHandler> QueueTrigger<R, H> {
    pub fn new(receiver: R, handler: H) -> Self {
        Self { receiver, handler }
    }

    /// Receive and dispatch until `shutdown` is cancelled
    ///
    /// A message already being handled is settled before the loop exits.
    ///
    /// # Errors
    /// Returns an error if a receive fails
    pub async fn run(&self, shutdown: CancellationToken) -> Result<TriggerSummary> {
        let mut summary = TriggerSummary::default();

        loop {
            let received = tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping receive loop");
                    break;
                }
                received = self.receiver.receive() => {
                    received.context("Failed to receive from queue")?
                }
            };

            let Some(message) = received else {
                debug!("Receive timed out with no message");
                continue;
            };

            let span = info_span!(
                "queue.message",
                message.id = %message.message_id,
                delivery_count = message.delivery_count,
            );
            self.dispatch(&message, &mut summary).instrument(span).await;
        }

        Ok(summary)
    }

    async fn dispatch(&self, message: &QueueMessage, summary: &mut TriggerSummary) {
        let start = Instant::now();
        match self.handler.handle(message).await {
            Ok(()) => {
                metrics::observe_message_processing_duration(start.elapsed().as_secs_f64());
                metrics::increment_messages_processed();
                summary.processed += 1;
                if let Err(e) = self.receiver.complete(message).await {
                    warn!(error = %format!("{e:#}"), "Failed to complete message, it will be redelivered");
                }
            }
            Err(e) => {
                metrics::increment_message_failures();
                summary.failed += 1;
                warn!(error = %format!("{e:#}"), "Handler failed, abandoning message");
                if let Err(e) = self.receiver.abandon(message).await {
                    warn!(error = %format!("{e:#}"), "Failed to abandon message, lock will expire");
                }
            }
        }
    }
}
