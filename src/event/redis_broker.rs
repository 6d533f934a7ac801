//! Redis pub/sub broker.
//!
//! Events are JSON-encoded and sent with `PUBLISH <topic> <json>`, so any
//! Redis subscriber on `room/{id}/events` (or a `room/*/events` pattern)
//! receives them.
//!
//! `ConnectionManager` is cheap to clone and safe for concurrent use; it also
//! reconnects on its own, so one instance is shared for the process lifetime.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, error, instrument};

use super::broker::{EventBroker, PublishError};
use super::events::RoomEvent;

#[derive(Clone)]
pub struct RedisBroker {
    connection: ConnectionManager,
}

impl RedisBroker {
    /// Connect to the broker at `redis_url`
    pub async fn connect(redis_url: &str) -> Result<Self, PublishError> {
        // Do not log redis_url, it may carry credentials
        let client = Client::open(redis_url).map_err(|e| {
            error!(error = %e, "Failed to open Redis client");
            PublishError::Broker(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!(error = %e, "Failed to connect to Redis");
            PublishError::Broker(format!("Failed to connect to Redis: {e}"))
        })?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl EventBroker for RedisBroker {
    #[instrument(skip_all, fields(topic = %topic, event_type = event.event_type.as_ref()))]
    async fn publish(&self, topic: &str, event: &RoomEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;

        let mut conn = self.connection.clone();
        let receivers: i64 = conn
            .publish(topic, payload)
            .await
            .map_err(|e| PublishError::Broker(e.to_string()))?;

        debug!(receivers = receivers, "Event published to Redis");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
