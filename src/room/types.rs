use serde::Deserialize;

use crate::shared::AppError;

/// Request payload for creating a new room
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreateRequest {
    pub host_id: String,
}

/// Request payload for joining a room
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub participant_id: String,
}

/// Rejects blank identifiers coming in over the API
pub fn require_id(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
