use async_trait::async_trait;
use thiserror::Error;

use super::events::RoomEvent;

/// Errors that can occur when handing an event to the broker
///
/// None of these ever reach an API caller: the publisher logs them and moves on.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Broker timed out")]
    Timeout,

    #[error("Publish queue is full")]
    QueueFull,

    #[error("Publisher is shut down")]
    Closed,

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Broker error: {0}")]
    Broker(String),
}

/// Destination for room lifecycle events
///
/// Implementations must be safe to share across tasks without external locking.
#[async_trait]
pub trait EventBroker: Send + Sync {
    /// Deliver one event to `topic`
    async fn publish(&self, topic: &str, event: &RoomEvent) -> Result<(), PublishError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
