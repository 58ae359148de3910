//! Wire frames
//!
//! Every frame, in both directions, is one JSON object with an `event`
//! name and an optional `data` payload. Client frames may carry an
//! `eventId`; frames that do are acknowledged with an `ack` frame
//! echoing that id, and redeliveries of the same id are absorbed.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A frame received from a client
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    /// Event name (e.g., "start-chat", "send-message")
    pub event: String,
    /// Client-generated delivery id, echoed in the acknowledgment
    #[serde(rename = "eventId", default)]
    pub event_id: Option<String>,
    /// Event payload
    #[serde(default)]
    pub data: Value,
}

impl ClientFrame {
    /// Parse a frame from raw JSON text
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// A frame sent to a client
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame {
    /// Event name
    pub event: String,
    /// Event payload
    pub data: Value,
}

/// Acknowledgment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    Error,
}

impl ServerFrame {
    /// Create a new frame
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Acknowledgment frame for a client event id
    #[must_use]
    pub fn ack(event_id: &str, status: AckStatus, detail: Option<&str>) -> Self {
        let mut data = json!({
            "eventId": event_id,
            "status": status,
        });
        if let Some(detail) = detail {
            data["detail"] = Value::String(detail.to_string());
        }
        Self::new("ack", data)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Query parameters of the WebSocket handshake
///
/// A reconnecting client presents the session and room it held before
/// the drop; a first-time client presents neither.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub chat_room_id: Option<String>,
}

/// Payload carrying only a room reference
#[derive(Debug, Clone, Deserialize)]
pub struct RoomRef {
    #[serde(rename = "chatRoomId")]
    pub chat_room_id: String,
}

/// Payload of a send-message event
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageData {
    #[serde(rename = "chatRoomId")]
    pub chat_room_id: String,
    #[serde(rename = "messageId")]
    pub message_id: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_frame_parsing() {
        let frame = ClientFrame::from_json(
            r#"{"event":"send-message","eventId":"e1","data":{"chatRoomId":"r1","messageId":"m1","body":"hi"}}"#,
        )
        .unwrap();
        assert_eq!(frame.event, "send-message");
        assert_eq!(frame.event_id.as_deref(), Some("e1"));

        let data: SendMessageData = serde_json::from_value(frame.data).unwrap();
        assert_eq!(data.chat_room_id, "r1");
        assert_eq!(data.message_id, "m1");
        assert_eq!(data.body, "hi");
    }

    #[test]
    fn test_client_frame_without_event_id() {
        let frame = ClientFrame::from_json(r#"{"event":"start-chat"}"#).unwrap();
        assert!(frame.event_id.is_none());
        assert!(frame.data.is_null());
    }

    #[test]
    fn test_ack_frame_shape() {
        let ack = ServerFrame::ack("e1", AckStatus::Ok, Some("duplicate"));
        let json = ack.to_json().unwrap();
        assert!(json.contains(r#""event":"ack""#));
        assert!(json.contains(r#""eventId":"e1""#));
        assert!(json.contains(r#""status":"ok""#));
        assert!(json.contains(r#""detail":"duplicate""#));
    }

    #[test]
    fn test_ack_frame_without_detail() {
        let ack = ServerFrame::ack("e1", AckStatus::Error, None);
        let json = ack.to_json().unwrap();
        assert!(!json.contains("detail"));
        assert!(json.contains(r#""status":"error""#));
    }
}
