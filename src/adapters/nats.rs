//! Event publishers.

use crate::domain::events::DomainEvent;
use crate::ports::{EventPublisher, PublishError};

/// Publishes JSON-encoded events on `ecommerce.<aggregate>.<event>` subjects.
#[derive(Clone, Debug)]
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub async fn connect(url: &str) -> Result<Self, async_nats::ConnectError> {
        let client = async_nats::connect(url).await?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(event.subject(), payload.into())
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))
    }
}

/// Fallback when no bus is configured: events only reach the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogPublisher;

#[async_trait::async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        tracing::debug!(subject = %event.subject(), %payload, "domain event");
        Ok(())
    }
}
