// Library crate for the hermes signaling server
// This file exposes the public API for the binary and integration tests

pub mod config;
pub mod event;
pub mod room;
pub mod shared;

use axum::{routing::get, Router};

// Re-export commonly used types for easier access in tests
pub use config::Config;
pub use event::{EventBroker, EventBus, EventPublisher, PublisherConfig, RoomEvent};
pub use room::{repository::RoomRepository, JoinOutcome, Room, RoomService, RoomSettings};
pub use shared::{AppError, AppState};

/// Full HTTP application: room API plus health check
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(room::routes())
        .with_state(state)
}
