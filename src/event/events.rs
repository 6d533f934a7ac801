use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum_macros::AsRefStr;

/// Namespace every room topic lives under
const ROOM_TOPIC_PREFIX: &str = "room";

/// Kinds of room lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
pub enum EventType {
    RoomCreated,
    ParticipantJoined,
    RoomDeleted,
}

/// A lifecycle event as it goes out on the wire
///
/// Events represent facts about things that have already happened: they are
/// only built after the store accepted the matching mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub payload: Value,
}

impl RoomEvent {
    pub fn room_created(host_id: &str) -> Self {
        Self {
            event_type: EventType::RoomCreated,
            payload: json!({ "hostId": host_id }),
        }
    }

    pub fn participant_joined(participant_id: &str) -> Self {
        Self {
            event_type: EventType::ParticipantJoined,
            payload: json!({ "participantId": participant_id }),
        }
    }

    pub fn room_deleted() -> Self {
        Self {
            event_type: EventType::RoomDeleted,
            payload: Value::Null,
        }
    }
}

/// Broker topic for a room. Derived only from the room id.
pub fn room_topic(room_id: &str) -> String {
    format!("{}/{}/events", ROOM_TOPIC_PREFIX, room_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_topic_format() {
        assert_eq!(room_topic("abc-123"), "room/abc-123/events");
    }

    #[test]
    fn test_event_wire_format() {
        let event = RoomEvent::participant_joined("p1");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(
            value,
            json!({ "type": "ParticipantJoined", "payload": { "participantId": "p1" } })
        );
    }

    #[test]
    fn test_deleted_event_has_null_payload() {
        let value = serde_json::to_value(RoomEvent::room_deleted()).unwrap();
        assert_eq!(value, json!({ "type": "RoomDeleted", "payload": null }));
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(EventType::RoomCreated.as_ref(), "RoomCreated");
        assert_eq!(EventType::ParticipantJoined.as_ref(), "ParticipantJoined");
        assert_eq!(EventType::RoomDeleted.as_ref(), "RoomDeleted");
    }
}
