use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

use hermes::{
    event::{EventBroker, PublishError, RoomEvent},
    room::repository::{InMemoryRoomRepository, RoomRepository},
    AppError, Room,
};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Broker that keeps every (topic, event) pair it receives
#[derive(Default)]
pub struct RecordingBroker {
    published: Mutex<Vec<(String, RoomEvent)>>,
}

impl RecordingBroker {
    pub async fn events(&self) -> Vec<(String, RoomEvent)> {
        self.published.lock().await.clone()
    }

    pub async fn events_on(&self, topic: &str) -> Vec<RoomEvent> {
        self.published
            .lock()
            .await
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[async_trait]
impl EventBroker for RecordingBroker {
    async fn publish(&self, topic: &str, event: &RoomEvent) -> Result<(), PublishError> {
        self.published
            .lock()
            .await
            .push((topic.to_string(), event.clone()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Broker that is always down
pub struct FailingBroker;

#[async_trait]
impl EventBroker for FailingBroker {
    async fn publish(&self, _topic: &str, _event: &RoomEvent) -> Result<(), PublishError> {
        Err(PublishError::Broker("connection refused".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// In-memory repository whose first `conflicts` conditional updates lose the race
pub struct ConflictInjectingRepository {
    inner: InMemoryRoomRepository,
    remaining_conflicts: AtomicU32,
    update_calls: AtomicU32,
}

impl ConflictInjectingRepository {
    pub fn new(conflicts: u32) -> Self {
        Self {
            inner: InMemoryRoomRepository::new(),
            remaining_conflicts: AtomicU32::new(conflicts),
            update_calls: AtomicU32::new(0),
        }
    }

    pub fn update_calls(&self) -> u32 {
        self.update_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoomRepository for ConflictInjectingRepository {
    async fn create_room(&self, room: &Room) -> Result<(), AppError> {
        self.inner.create_room(room).await
    }

    async fn get_room(&self, room_id: &str) -> Result<Room, AppError> {
        self.inner.get_room(room_id).await
    }

    async fn update_room_if_version(
        &self,
        room: &Room,
        expected_version: i64,
    ) -> Result<(), AppError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let injected = self
            .remaining_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(AppError::VersionConflict(room.id.clone()));
        }

        self.inner.update_room_if_version(room, expected_version).await
    }

    async fn delete_room(&self, room_id: &str) -> Result<(), AppError> {
        self.inner.delete_room(room_id).await
    }

    async fn delete_room_if_idle(
        &self,
        room_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.inner.delete_room_if_idle(room_id, cutoff).await
    }

    async fn list_idle_rooms(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        self.inner.list_idle_rooms(cutoff).await
    }
}

/// Repository whose backing store is unavailable
pub struct FailingRepository;

#[async_trait]
impl RoomRepository for FailingRepository {
    async fn create_room(&self, _room: &Room) -> Result<(), AppError> {
        Err(AppError::Persistence("store unavailable".to_string()))
    }

    async fn get_room(&self, _room_id: &str) -> Result<Room, AppError> {
        Err(AppError::Persistence("store unavailable".to_string()))
    }

    async fn update_room_if_version(&self, _room: &Room, _: i64) -> Result<(), AppError> {
        Err(AppError::Persistence("store unavailable".to_string()))
    }

    async fn delete_room(&self, _room_id: &str) -> Result<(), AppError> {
        Err(AppError::Persistence("store unavailable".to_string()))
    }

    async fn delete_room_if_idle(
        &self,
        _room_id: &str,
        _cutoff: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        Err(AppError::Persistence("store unavailable".to_string()))
    }

    async fn list_idle_rooms(&self, _cutoff: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        Err(AppError::Persistence("store unavailable".to_string()))
    }
}
