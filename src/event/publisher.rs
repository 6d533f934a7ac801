use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::broker::{EventBroker, PublishError};
use super::events::RoomEvent;

/// Configuration for the background publisher
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Events that may wait for the broker before new ones are dropped
    pub queue_capacity: usize,
    /// Upper bound on a single broker call
    pub publish_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            publish_timeout: Duration::from_secs(2),
        }
    }
}

enum Command {
    Publish { topic: String, event: RoomEvent },
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget handle onto the broker
///
/// `publish` never waits on the broker: events go onto a bounded queue that a
/// single worker task drains in order. Anything that goes wrong after that
/// point is logged and dropped.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: mpsc::Sender<Command>,
}

impl EventPublisher {
    /// Spawns the worker task and returns a handle to feed it
    ///
    /// The worker stops once every `EventPublisher` clone has been dropped
    /// and the queue is drained.
    pub fn spawn(broker: Arc<dyn EventBroker>, config: PublisherConfig) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let worker = tokio::spawn(run_worker(broker, receiver, config.publish_timeout));
        (Self { sender }, worker)
    }

    /// Queue `event` for `topic` without waiting for delivery
    pub fn publish(&self, topic: String, event: RoomEvent) {
        let event_type = event.event_type;
        if let Err(e) = self.enqueue(topic.clone(), event) {
            warn!(
                topic = %topic,
                event_type = event_type.as_ref(),
                error = %e,
                "Dropping room event"
            );
        }
    }

    fn enqueue(&self, topic: String, event: RoomEvent) -> Result<(), PublishError> {
        self.sender
            .try_send(Command::Publish { topic, event })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => PublishError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
            })
    }

    /// Waits until every event queued before this call was handed to the broker
    pub async fn flush(&self) -> Result<(), PublishError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(Command::Flush(ack))
            .await
            .map_err(|_| PublishError::Closed)?;
        done.await.map_err(|_| PublishError::Closed)
    }
}

async fn run_worker(
    broker: Arc<dyn EventBroker>,
    mut receiver: mpsc::Receiver<Command>,
    publish_timeout: Duration,
) {
    let broker_name = broker.name();
    info!(
        broker = broker_name,
        timeout_ms = publish_timeout.as_millis() as u64,
        "Event publisher started"
    );

    while let Some(command) = receiver.recv().await {
        let (topic, event) = match command {
            Command::Publish { topic, event } => (topic, event),
            Command::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };

        let result = match timeout(publish_timeout, broker.publish(&topic, &event)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout),
        };

        match result {
            Ok(()) => debug!(
                broker = broker_name,
                topic = %topic,
                event_type = event.event_type.as_ref(),
                "Room event published"
            ),
            Err(e) => warn!(
                broker = broker_name,
                topic = %topic,
                event_type = event.event_type.as_ref(),
                error = %e,
                "Failed to publish room event"
            ),
        }
    }

    info!(broker = broker_name, "Event publisher stopped");
}
