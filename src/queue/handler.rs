//! # Message Handler
//!
//! Logs the received payload and pauses to simulate work.

use super::{MessageHandler, QueueMessage};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// Log `payload` once at INFO and wait `delay`
pub async fn process_message(payload: &str, delay: Duration) {
    info!("ServiceBus queue trigger function processed message: {}", payload);
    tokio::time::sleep(delay).await;
}

/// [`MessageHandler`] that runs [`process_message`]
#[derive(Debug, Clone)]
pub struct LoggingHandler {
    processing_delay: Duration,
}

impl LoggingHandler {
    #[must_use]
    pub fn new(processing_delay: Duration) -> Self {
        Self { processing_delay }
    }
}

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn handle(&self, message: &QueueMessage) -> Result<()> {
        process_message(&message.body, self.processing_delay).await;
        Ok(())
    }
}
