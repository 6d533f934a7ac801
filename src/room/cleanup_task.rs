use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use super::service::RoomService;
use crate::shared::AppError;

/// Configuration for the cleanup task
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to run the cleanup task
    pub cleanup_interval: Duration,
    /// How long a room must be inactive before deletion
    pub inactivity_threshold: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(30 * 60), // 30 minutes
            inactivity_threshold: Duration::from_secs(24 * 60 * 60), // 24 hours
        }
    }
}

/// Starts the background cleanup task that periodically removes inactive rooms
///
/// Rooms are removed through the service, so each one still announces
/// `RoomDeleted` on its topic.
#[instrument(skip(room_service))]
pub async fn start_cleanup_task(room_service: Arc<RoomService>, config: CleanupConfig) {
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        inactivity_threshold_secs = config.inactivity_threshold.as_secs(),
        "Starting room cleanup background task"
    );

    let mut cleanup_interval = interval(config.cleanup_interval);
    cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        cleanup_interval.tick().await;

        match cleanup_inactive_rooms(&room_service, config.inactivity_threshold).await {
            Ok(deleted_count) => {
                info!(deleted_count = deleted_count, "Room cleanup completed");
            }
            Err(e) => {
                error!(error = %e, "Room cleanup task failed");
            }
        }
    }
}

/// Deletes rooms that have been inactive for longer than the threshold
///
/// A room that sees a join after it was listed is kept.
#[instrument(skip(room_service))]
pub async fn cleanup_inactive_rooms(
    room_service: &RoomService,
    inactivity_threshold: Duration,
) -> Result<usize, AppError> {
    let cutoff = RoomService::idle_cutoff(inactivity_threshold)?;
    let inactive_room_ids = room_service.idle_room_ids(cutoff).await?;

    if inactive_room_ids.is_empty() {
        return Ok(0);
    }

    info!(
        count = inactive_room_ids.len(),
        "Found inactive rooms to delete"
    );

    let mut deleted_count = 0;

    for room_id in inactive_room_ids {
        match room_service.delete_room_if_idle(&room_id, cutoff).await {
            Ok(true) => {
                deleted_count += 1;
                info!(room_id = %room_id, "Deleted inactive room");
            }
            Ok(false) => {
                debug!(room_id = %room_id, "Room became active, skipping");
            }
            // Deleted by someone else since it was listed
            Err(AppError::NotFound(_)) => {}
            Err(e) => {
                warn!(
                    room_id = %room_id,
                    error = %e,
                    "Failed to delete inactive room"
                );
            }
        }
    }

    Ok(deleted_count)
}
