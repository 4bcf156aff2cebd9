//! Chat message types and their wire shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{participant::UserId, topic::RoomName};

/// A single chat message.
///
/// Produced either locally (optimistic echo on send, timestamp stamped by
/// the sender) or received from the broker (authoritative). Field names on
/// the wire are camelCase JSON: `senderId`, `receiverId`, `message`,
/// `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Author of the message.
    pub sender_id: UserId,
    /// Addressee of the message.
    pub receiver_id: UserId,
    /// Message body.
    pub message: String,
    /// RFC 3339 instant the message was created. Absent on payloads from
    /// peers that never stamp one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Outbound chat payload with the resolved room context attached.
///
/// The broker receives every chat message on one fixed command channel
/// ([`crate::CHAT_SEND_DESTINATION`]), so the room it belongs to travels
/// inside the payload rather than in the destination name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressedMessage {
    /// Room the message belongs to.
    pub room_name: RoomName,
    /// The message itself, flattened into the same JSON object.
    #[serde(flatten)]
    pub message: ChatMessage,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wire_field_names_are_camel_case() {
        let message = ChatMessage {
            sender_id: UserId::new(1),
            receiver_id: UserId::new(2),
            message: "hi".to_string(),
            timestamp: None,
        };
        let addressed =
            AddressedMessage { room_name: RoomName::new("room-a"), message };

        let value: serde_json::Value =
            serde_json::from_slice(&serde_json::to_vec(&addressed).unwrap()).unwrap();

        assert_eq!(value["roomName"], "room-a");
        assert_eq!(value["senderId"], 1);
        assert_eq!(value["receiverId"], 2);
        assert_eq!(value["message"], "hi");
        // An unset timestamp is omitted entirely, not serialized as null.
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn history_payload_roundtrips_without_timestamp() {
        let body = r#"[{"senderId":3,"receiverId":4,"message":"hello"}]"#;

        let history: Vec<ChatMessage> = serde_json::from_str(body).unwrap();

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender_id, UserId::new(3));
        assert_eq!(history[0].timestamp, None);
    }
}
