// Room event broadcast
//
// Lifecycle events leave the service through an `EventPublisher`, which hands
// them to an `EventBroker` on a background task so broker trouble never reaches
// the request path.

// Public API - what other modules can use
pub use broker::{EventBroker, PublishError};
pub use bus::EventBus;
pub use events::{room_topic, EventType, RoomEvent};
pub use publisher::{EventPublisher, PublisherConfig};
pub use redis_broker::RedisBroker;

// Internal modules
mod broker;
mod bus;
mod events;
mod publisher;
mod redis_broker;
