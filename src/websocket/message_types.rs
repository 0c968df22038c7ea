use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound WebSocket events from client to server
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsInboundEvent {
    #[serde(rename = "sendMessage", rename_all = "camelCase")]
    SendMessage {
        conversation_id: Uuid,
        content: String,
    },

    #[serde(rename = "markAsRead", rename_all = "camelCase")]
    MarkAsRead { conversation_id: Uuid },

    #[serde(rename = "joinConversation", rename_all = "camelCase")]
    JoinConversation { conversation_id: Uuid },

    #[serde(rename = "leaveConversation", rename_all = "camelCase")]
    LeaveConversation { conversation_id: Uuid },
}

/// Outbound WebSocket events from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsOutboundEvent {
    /// A chat message, delivered to every participant's registered
    /// connection (sender included, for multi-tab consistency).
    #[serde(rename = "message", rename_all = "camelCase")]
    Message {
        id: Uuid,
        text: String,
        sender_id: Uuid,
        /// Rendered wall-clock time, e.g. "3:05 PM".
        timestamp: String,
        is_read: bool,
        conversation_id: Uuid,
    },

    /// The reader swept a conversation; sent to the other participant only.
    #[serde(rename = "messagesRead", rename_all = "camelCase")]
    MessagesRead {
        conversation_id: Uuid,
        user_id: Uuid,
    },

    /// Presence change, fanned out to everyone sharing a conversation with
    /// the user.
    #[serde(rename = "userStatus", rename_all = "camelCase")]
    UserStatus { user_id: Uuid, is_online: bool },

    /// Delivered to the originating connection only; never fatal.
    #[serde(rename = "error")]
    Error { message: String },
}

impl WsOutboundEvent {
    pub fn to_json(&self) -> String {
        // The enum serializes infallibly; fall back to a bare error object
        // rather than panicking in a delivery path.
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"type":"error","message":"internal server error"}"#.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_message() {
        let conv = Uuid::new_v4();
        let raw = format!(r#"{{"type":"sendMessage","conversationId":"{conv}","content":"Hi"}}"#);
        match serde_json::from_str::<WsInboundEvent>(&raw).unwrap() {
            WsInboundEvent::SendMessage {
                conversation_id,
                content,
            } => {
                assert_eq!(conversation_id, conv);
                assert_eq!(content, "Hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_room_events() {
        let conv = Uuid::new_v4();
        for kind in ["joinConversation", "leaveConversation", "markAsRead"] {
            let raw = format!(r#"{{"type":"{kind}","conversationId":"{conv}"}}"#);
            assert!(serde_json::from_str::<WsInboundEvent>(&raw).is_ok(), "{kind}");
        }
    }

    #[test]
    fn rejects_unknown_event_type() {
        assert!(serde_json::from_str::<WsInboundEvent>(r#"{"type":"shrug"}"#).is_err());
    }

    #[test]
    fn message_event_wire_shape() {
        let event = WsOutboundEvent::Message {
            id: Uuid::nil(),
            text: "Hi".into(),
            sender_id: Uuid::nil(),
            timestamp: "3:05 PM".into(),
            is_read: false,
            conversation_id: Uuid::nil(),
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["type"], "message");
        for key in ["id", "text", "senderId", "timestamp", "isRead", "conversationId"] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["isRead"], false);
    }

    #[test]
    fn status_event_wire_shape() {
        let event = WsOutboundEvent::UserStatus {
            user_id: Uuid::nil(),
            is_online: true,
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["type"], "userStatus");
        assert_eq!(value["isOnline"], true);
        assert!(value.get("userId").is_some());
    }
}
