use axum::{
    routing::{get, post},
    Router,
};

use crate::shared::AppState;

// Public API - what other modules can use
pub use cleanup_task::{start_cleanup_task, CleanupConfig};
pub use handlers::{create_room, delete_room, get_room, join_room};
pub use models::Room;
pub use service::{JoinOutcome, RoomService, RoomSettings};

// Internal modules
pub mod cleanup_task;
mod handlers;
pub mod models;
pub mod repository;
mod service;
mod types;

/// Room API routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/room", post(create_room))
        .route(
            "/room/:id",
            get(get_room).post(join_room).delete(delete_room),
        )
}
