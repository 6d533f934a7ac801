use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::broker::{EventBroker, PublishError};
use super::events::{EventType, RoomEvent};

const DEFAULT_TOPIC_CAPACITY: usize = 100;

/// In-process broker: one broadcast channel per topic
///
/// Used when no external broker is configured, and by tests that want to
/// observe the events a room emits.
#[derive(Debug, Clone)]
pub struct EventBus {
    /// topic -> sender
    topic_channels: Arc<RwLock<HashMap<String, broadcast::Sender<RoomEvent>>>>,
    topic_capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_CAPACITY)
    }
}

impl EventBus {
    /// Creates a new event bus with the given per-topic buffer capacity
    pub fn new(topic_capacity: usize) -> Self {
        Self {
            topic_channels: Arc::new(RwLock::new(HashMap::new())),
            topic_capacity: topic_capacity.max(1),
        }
    }

    /// Emits an event to all current subscribers of a topic
    ///
    /// Returns the number of receivers the event reached.
    pub async fn emit(&self, topic: &str, event: RoomEvent) -> usize {
        if event.event_type == EventType::RoomDeleted {
            return self.close_topic(topic, event).await;
        }

        let delivered = {
            let topic_channels = self.topic_channels.read().await;
            match topic_channels.get(topic) {
                Some(sender) => sender.send(event).unwrap_or(0),
                None => 0,
            }
        };

        debug!(topic = %topic, receivers = delivered, "Topic event emitted");

        if delivered == 0 {
            let mut topic_channels = self.topic_channels.write().await;
            let abandoned = topic_channels
                .get(topic)
                .is_some_and(|sender| sender.receiver_count() == 0);
            if abandoned && topic_channels.remove(topic).is_some() {
                debug!(topic = %topic, "Topic channel dropped");
            }
        }

        delivered
    }

    /// Sends the final event of a topic and drops its channel
    ///
    /// Both happen under the write guard, so a subscriber either receives the
    /// event before `Closed` or lands on a fresh channel.
    async fn close_topic(&self, topic: &str, event: RoomEvent) -> usize {
        let mut topic_channels = self.topic_channels.write().await;
        let Some(sender) = topic_channels.remove(topic) else {
            return 0;
        };

        // Receivers still drain anything buffered before seeing the close
        let delivered = sender.send(event).unwrap_or(0);
        debug!(topic = %topic, receivers = delivered, "Topic closed");
        delivered
    }

    /// Subscribe to events for a topic
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<RoomEvent> {
        let mut topic_channels = self.topic_channels.write().await;

        if let Some(sender) = topic_channels.get(topic) {
            return sender.subscribe();
        }

        debug!(topic = %topic, "Creating new topic channel for subscription");
        let (sender, receiver) = broadcast::channel(self.topic_capacity);
        topic_channels.insert(topic.to_string(), sender);
        receiver
    }

    /// Number of topics that currently have a channel
    pub async fn topic_count(&self) -> usize {
        self.topic_channels.read().await.len()
    }
}

#[async_trait]
impl EventBroker for EventBus {
    async fn publish(&self, topic: &str, event: &RoomEvent) -> Result<(), PublishError> {
        self.emit(topic, event.clone()).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-process"
    }
}
