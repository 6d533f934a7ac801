use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use super::{models::Room, repository::RoomRepository};
use crate::event::{room_topic, EventPublisher, RoomEvent};
use crate::shared::AppError;

/// Tunables for room lifecycle operations
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Read-modify-write rounds a join may take before giving up with `Contention`
    pub max_join_attempts: u32,
    /// Upper bound on each individual store call
    pub store_timeout: Duration,
    /// Whether a join for a participant already in the room is announced again
    pub republish_on_rejoin: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_join_attempts: 5,
            store_timeout: Duration::from_secs(5),
            republish_on_rejoin: false,
        }
    }
}

/// Result of a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The participant was appended; holds the new revision
    Joined(Room),
    /// The participant was already a member; nothing was written
    AlreadyJoined(Room),
}

impl JoinOutcome {
    pub fn room(&self) -> &Room {
        match self {
            JoinOutcome::Joined(room) | JoinOutcome::AlreadyJoined(room) => room,
        }
    }
}

/// Service for handling room lifecycle logic
///
/// Every operation settles with the store first; only an accepted change is
/// announced, and announcing never changes the outcome returned to the caller.
pub struct RoomService {
    repository: Arc<dyn RoomRepository + Send + Sync>,
    publisher: EventPublisher,
    settings: RoomSettings,
}

impl RoomService {
    pub fn new(
        repository: Arc<dyn RoomRepository + Send + Sync>,
        publisher: EventPublisher,
        settings: RoomSettings,
    ) -> Self {
        Self {
            repository,
            publisher,
            settings,
        }
    }

    /// Handle onto the publisher, for flushing at shutdown
    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Creates a new room with a generated ID
    #[instrument(skip(self))]
    pub async fn create_room(&self, host_id: String) -> Result<Room, AppError> {
        let room = Room::new(host_id);
        debug!(room_id = %room.id, "Generated room ID");

        self.store_call("create_room", self.repository.create_room(&room))
            .await?;

        self.publisher.publish(
            room_topic(&room.id),
            RoomEvent::room_created(&room.host_id),
        );

        info!(room_id = %room.id, host_id = %room.host_id, "Room created successfully");
        Ok(room)
    }

    #[instrument(skip(self))]
    pub async fn get_room(&self, room_id: &str) -> Result<Room, AppError> {
        self.store_call("get_room", self.repository.get_room(room_id))
            .await
    }

    /// Adds a participant to a room
    ///
    /// Reads the room, appends the participant and writes back only if nobody
    /// else wrote in between. A lost race re-reads and tries again, at most
    /// `max_join_attempts` times in total.
    #[instrument(skip(self))]
    pub async fn join_room(
        &self,
        room_id: &str,
        participant_id: &str,
    ) -> Result<JoinOutcome, AppError> {
        let outcome = self.join_with_retry(room_id, participant_id).await?;

        match &outcome {
            JoinOutcome::Joined(room) => {
                info!(
                    room_id = %room_id,
                    participant_id = %participant_id,
                    participant_count = room.participant_ids.len(),
                    version = room.version,
                    "Participant joined room"
                );
                self.publisher.publish(
                    room_topic(room_id),
                    RoomEvent::participant_joined(participant_id),
                );
            }
            JoinOutcome::AlreadyJoined(_) => {
                info!(
                    room_id = %room_id,
                    participant_id = %participant_id,
                    "Participant already in room"
                );
                if self.settings.republish_on_rejoin {
                    self.publisher.publish(
                        room_topic(room_id),
                        RoomEvent::participant_joined(participant_id),
                    );
                }
            }
        }

        Ok(outcome)
    }

    async fn join_with_retry(
        &self,
        room_id: &str,
        participant_id: &str,
    ) -> Result<JoinOutcome, AppError> {
        let max_attempts = self.settings.max_join_attempts.max(1);

        for attempt in 1..=max_attempts {
            let current = self
                .store_call("get_room", self.repository.get_room(room_id))
                .await?;

            let Some(candidate) = current.with_participant(participant_id, Utc::now()) else {
                return Ok(JoinOutcome::AlreadyJoined(current));
            };

            match self
                .store_call(
                    "update_room_if_version",
                    self.repository
                        .update_room_if_version(&candidate, current.version),
                )
                .await
            {
                Ok(()) => return Ok(JoinOutcome::Joined(candidate)),
                Err(AppError::VersionConflict(_)) => {
                    debug!(
                        room_id = %room_id,
                        attempt = attempt,
                        seen_version = current.version,
                        "Join lost a concurrent update, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            room_id = %room_id,
            participant_id = %participant_id,
            attempts = max_attempts,
            "Join gave up after repeated version conflicts"
        );
        Err(AppError::Contention(format!(
            "Room {room_id} is being modified concurrently, try again"
        )))
    }

    /// Deletes a room permanently
    #[instrument(skip(self))]
    pub async fn delete_room(&self, room_id: &str) -> Result<(), AppError> {
        self.store_call("delete_room", self.repository.delete_room(room_id))
            .await?;

        self.publisher
            .publish(room_topic(room_id), RoomEvent::room_deleted());

        info!(room_id = %room_id, "Room deleted successfully");
        Ok(())
    }

    /// Latest `last_activity` that still counts as idle after `idle_for`
    pub fn idle_cutoff(idle_for: Duration) -> Result<DateTime<Utc>, AppError> {
        chrono::Duration::from_std(idle_for)
            .ok()
            .and_then(|delta| Utc::now().checked_sub_signed(delta))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Idle threshold of {}s is out of range",
                    idle_for.as_secs()
                ))
            })
    }

    /// Ids of rooms with no membership change since `cutoff`
    pub async fn idle_room_ids(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        self.store_call("list_idle_rooms", self.repository.list_idle_rooms(cutoff))
            .await
    }

    /// Deletes a room that is still idle at `cutoff`
    ///
    /// Returns `false` and leaves the room alone if it saw activity since it
    /// was listed. `RoomDeleted` is published only for an actual delete.
    #[instrument(skip(self))]
    pub async fn delete_room_if_idle(
        &self,
        room_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let deleted = self
            .store_call(
                "delete_room_if_idle",
                self.repository.delete_room_if_idle(room_id, cutoff),
            )
            .await?;

        if deleted {
            self.publisher
                .publish(room_topic(room_id), RoomEvent::room_deleted());
            info!(room_id = %room_id, "Idle room deleted");
        }

        Ok(deleted)
    }

    /// Runs one store call under the configured deadline
    async fn store_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, AppError>>,
    ) -> Result<T, AppError> {
        match timeout(self.settings.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation = operation,
                    timeout_ms = self.settings.store_timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(AppError::Persistence(format!("{operation} timed out")))
            }
        }
    }
}
