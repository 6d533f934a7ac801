use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::Room;
use crate::shared::AppError;

/// Trait for room repository operations
///
/// The repository is the only place a room's `version` is decided: it stores
/// `0` on create and `expected_version + 1` on every accepted update.
#[async_trait]
pub trait RoomRepository {
    /// Persists a new room. Fails with `AlreadyExists` on an id collision.
    async fn create_room(&self, room: &Room) -> Result<(), AppError>;

    async fn get_room(&self, room_id: &str) -> Result<Room, AppError>;

    /// Replaces the stored room only if its version still equals `expected_version`
    ///
    /// Fails with `VersionConflict` without touching the record otherwise.
    async fn update_room_if_version(
        &self,
        room: &Room,
        expected_version: i64,
    ) -> Result<(), AppError>;

    async fn delete_room(&self, room_id: &str) -> Result<(), AppError>;

    /// Deletes the room only if it has had no activity since `cutoff`
    ///
    /// The check and the delete are one atomic step. Returns `false` when the
    /// room exists but is still active, `NotFound` when it is gone.
    async fn delete_room_if_idle(
        &self,
        room_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Ids of rooms with no activity since `cutoff`
    async fn list_idle_rooms(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, AppError>;
}

/// In-memory implementation of RoomRepository for development and testing
pub struct InMemoryRoomRepository {
    rooms: RwLock<HashMap<String, Room>>,
}

impl Default for InMemoryRoomRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the current number of rooms in the repository
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self, room))]
    async fn create_room(&self, room: &Room) -> Result<(), AppError> {
        debug!(room_id = %room.id, host_id = %room.host_id, "Creating room in memory");

        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.id) {
            warn!(room_id = %room.id, "Room already exists in memory");
            return Err(AppError::AlreadyExists(format!("Room {}", room.id)));
        }

        let mut stored = room.clone();
        stored.version = 0;
        rooms.insert(stored.id.clone(), stored);

        debug!(room_id = %room.id, "Room created successfully in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room(&self, room_id: &str) -> Result<Room, AppError> {
        debug!(room_id = %room_id, "Fetching room from memory");

        let rooms = self.rooms.read().await;
        rooms.get(room_id).cloned().ok_or_else(|| {
            debug!(room_id = %room_id, "Room not found in memory");
            AppError::NotFound(format!("Room {room_id}"))
        })
    }

    #[instrument(skip(self, room), fields(room_id = %room.id))]
    async fn update_room_if_version(
        &self,
        room: &Room,
        expected_version: i64,
    ) -> Result<(), AppError> {
        // Check and write under one guard
        let mut rooms = self.rooms.write().await;

        let stored = rooms
            .get_mut(&room.id)
            .ok_or_else(|| AppError::NotFound(format!("Room {}", room.id)))?;

        if stored.version != expected_version {
            debug!(
                expected_version = expected_version,
                stored_version = stored.version,
                "Version conflict in memory"
            );
            return Err(AppError::VersionConflict(format!("Room {}", room.id)));
        }

        *stored = room.clone();
        stored.version = expected_version + 1;

        debug!(new_version = stored.version, "Room updated in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_room(&self, room_id: &str) -> Result<(), AppError> {
        debug!(room_id = %room_id, "Deleting room from memory");

        let mut rooms = self.rooms.write().await;
        if rooms.remove(room_id).is_none() {
            warn!(room_id = %room_id, "Room not found for deletion in memory");
            return Err(AppError::NotFound(format!("Room {room_id}")));
        }

        debug!(room_id = %room_id, "Room deleted successfully from memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_room_if_idle(
        &self,
        room_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut rooms = self.rooms.write().await;

        let stored = rooms
            .get(room_id)
            .ok_or_else(|| AppError::NotFound(format!("Room {room_id}")))?;

        if stored.last_activity >= cutoff {
            debug!(room_id = %room_id, "Room active again, keeping it");
            return Ok(false);
        }

        rooms.remove(room_id);
        debug!(room_id = %room_id, "Idle room deleted from memory");
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn list_idle_rooms(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .values()
            .filter(|room| room.last_activity < cutoff)
            .map(|room| room.id.clone())
            .collect())
    }
}

/// PostgreSQL implementation of room repository
///
/// Expects the `rooms` table from `migrations/`. The conditional update is a
/// single `UPDATE .. WHERE version = $n`, so it is atomic without row locks.
pub struct PostgresRoomRepository {
    pool: PgPool,
}

impl PostgresRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn database_error(e: sqlx::Error) -> AppError {
    warn!(error = %e, "Room query failed");
    AppError::Persistence(e.to_string())
}

#[async_trait]
impl RoomRepository for PostgresRoomRepository {
    #[instrument(skip(self, room))]
    async fn create_room(&self, room: &Room) -> Result<(), AppError> {
        debug!(room_id = %room.id, host_id = %room.host_id, "Creating room in database");

        let result = sqlx::query(
            "INSERT INTO rooms (id, host_id, participant_ids, created_at, last_activity, version) \
             VALUES ($1, $2, $3, $4, $5, 0) ON CONFLICT (id) DO NOTHING",
        )
        .bind(&room.id)
        .bind(&room.host_id)
        .bind(&room.participant_ids)
        .bind(room.created_at)
        .bind(room.last_activity)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 0 {
            warn!(room_id = %room.id, "Room already exists in database");
            return Err(AppError::AlreadyExists(format!("Room {}", room.id)));
        }

        debug!(room_id = %room.id, "Room created successfully in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room(&self, room_id: &str) -> Result<Room, AppError> {
        debug!(room_id = %room_id, "Fetching room from database");

        sqlx::query_as::<_, Room>(
            "SELECT id, host_id, participant_ids, created_at, last_activity, version \
             FROM rooms WHERE id = $1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?
        .ok_or_else(|| AppError::NotFound(format!("Room {room_id}")))
    }

    #[instrument(skip(self, room), fields(room_id = %room.id))]
    async fn update_room_if_version(
        &self,
        room: &Room,
        expected_version: i64,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE rooms SET participant_ids = $2, last_activity = $3, version = $4 \
             WHERE id = $1 AND version = $5",
        )
        .bind(&room.id)
        .bind(&room.participant_ids)
        .bind(room.last_activity)
        .bind(expected_version + 1)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 1 {
            debug!(new_version = expected_version + 1, "Room updated in database");
            return Ok(());
        }

        // Nothing matched: either the room is gone or someone else bumped it
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM rooms WHERE id = $1)")
            .bind(&room.id)
            .fetch_one(&self.pool)
            .await
            .map_err(database_error)?;

        if exists {
            debug!(expected_version = expected_version, "Version conflict in database");
            Err(AppError::VersionConflict(format!("Room {}", room.id)))
        } else {
            Err(AppError::NotFound(format!("Room {}", room.id)))
        }
    }

    #[instrument(skip(self))]
    async fn delete_room(&self, room_id: &str) -> Result<(), AppError> {
        debug!(room_id = %room_id, "Deleting room from database");

        let result = sqlx::query("DELETE FROM rooms WHERE id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        if result.rows_affected() == 0 {
            warn!(room_id = %room_id, "Room not found for deletion");
            return Err(AppError::NotFound(format!("Room {room_id}")));
        }

        debug!(room_id = %room_id, "Room deleted successfully from database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_room_if_idle(
        &self,
        room_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM rooms WHERE id = $1 AND last_activity < $2")
            .bind(room_id)
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        if result.rows_affected() == 1 {
            debug!(room_id = %room_id, "Idle room deleted from database");
            return Ok(true);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM rooms WHERE id = $1)")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(database_error)?;

        if exists {
            debug!(room_id = %room_id, "Room active again, keeping it");
            Ok(false)
        } else {
            Err(AppError::NotFound(format!("Room {room_id}")))
        }
    }

    #[instrument(skip(self))]
    async fn list_idle_rooms(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar("SELECT id FROM rooms WHERE last_activity < $1")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)
    }
}
