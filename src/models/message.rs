use crate::websocket::message_types::WsOutboundEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message delivery status. Transitions forward only: `sent` -> `read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Read,
}

impl MessageStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Read => "read",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "sent" => Some(MessageStatus::Sent),
            "read" => Some(MessageStatus::Read),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    /// Extensible tag; only "text" is produced today.
    pub message_type: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_read(&self) -> bool {
        self.status == MessageStatus::Read
    }

    /// The realtime `message` event for this row.
    pub fn to_event(&self) -> WsOutboundEvent {
        WsOutboundEvent::Message {
            id: self.id,
            text: self.content.clone(),
            sender_id: self.sender_id,
            timestamp: render_timestamp(self.created_at),
            is_read: self.is_read(),
            conversation_id: self.conversation_id,
        }
    }
}

/// Render a wall-clock timestamp the way the clients display it: "3:05 PM".
pub fn render_timestamp(at: DateTime<Utc>) -> String {
    at.format("%-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn renders_twelve_hour_timestamp() {
        let afternoon = Utc.with_ymd_and_hms(2024, 6, 1, 15, 5, 0).unwrap();
        assert_eq!(render_timestamp(afternoon), "3:05 PM");

        let morning = Utc.with_ymd_and_hms(2024, 6, 1, 9, 40, 0).unwrap();
        assert_eq!(render_timestamp(morning), "9:40 AM");
    }

    #[test]
    fn status_round_trips_through_db_strings() {
        assert_eq!(MessageStatus::from_db("sent"), Some(MessageStatus::Sent));
        assert_eq!(MessageStatus::from_db("read"), Some(MessageStatus::Read));
        assert_eq!(MessageStatus::from_db("gone"), None);
        assert_eq!(MessageStatus::Read.as_db(), "read");
    }

    #[test]
    fn event_reflects_read_state() {
        let msg = Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: "Hi".into(),
            message_type: "text".into(),
            status: MessageStatus::Sent,
            created_at: Utc::now(),
        };
        match msg.to_event() {
            WsOutboundEvent::Message { is_read, text, .. } => {
                assert!(!is_read);
                assert_eq!(text, "Hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
