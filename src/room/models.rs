use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A signaling room as stored and as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub host_id: String,
    /// Join order is kept; never holds the same id twice
    pub participant_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub version: i64,
}

impl Room {
    /// Creates a new room with a generated ID
    pub fn new(host_id: String) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            host_id,
            participant_ids: Vec::new(),
            created_at: now,
            last_activity: now,
            version: 0,
        }
    }

    /// Check if a participant is in this room
    pub fn has_participant(&self, participant_id: &str) -> bool {
        self.participant_ids.iter().any(|p| p == participant_id)
    }

    /// Builds the next revision of this room with `participant_id` appended
    ///
    /// Returns `None` when the participant is already present.
    pub fn with_participant(&self, participant_id: &str, now: DateTime<Utc>) -> Option<Room> {
        if self.has_participant(participant_id) {
            return None;
        }

        let mut next = self.clone();
        next.participant_ids.push(participant_id.to_string());
        next.last_activity = now.max(self.last_activity);
        next.version = self.version + 1;
        Some(next)
    }
}
