//! # Queue Trigger
//!
//! Service Bus queue trigger: a handler invoked once per message, and the
//! host that receives messages in peek-lock mode and settles them.
//!
//! - `handler`: the function body (log the payload, simulate work)
//! - `servicebus`: Service Bus REST client (receive, complete, abandon)
//! - `sas`: connection strings and shared access signatures
//! - `trigger`: settings and the receive/dispatch loop

pub mod handler;
pub mod sas;
pub mod servicebus;
pub mod trigger;

use anyhow::Result;
use async_trait::async_trait;

pub use handler::{process_message, LoggingHandler};
pub use servicebus::ServiceBusQueueClient;
pub use trigger::{QueueTrigger, TriggerSettings, TriggerSummary};

/// A message locked by a peek-lock receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub lock_token: String,
    pub delivery_count: u32,
    pub sequence_number: Option<i64>,
    /// Payload, decoded as UTF-8 (lossy)
    pub body: String,
}

/// Function body invoked for each received message
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one message; an error abandons it back to the broker
    async fn handle(&self, message: &QueueMessage) -> Result<()>;
}

/// Peek-lock receive and settlement
#[async_trait]
pub trait QueueReceiver: Send + Sync {
    /// Wait for the next message; `None` when the long poll timed out empty
    async fn receive(&self) -> Result<Option<QueueMessage>>;

    /// Delete a handled message
    async fn complete(&self, message: &QueueMessage) -> Result<()>;

    /// Release the lock so the broker can redeliver or dead-letter
    async fn abandon(&self, message: &QueueMessage) -> Result<()>;
}
