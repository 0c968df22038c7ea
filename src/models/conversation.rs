use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product-scoped thread between exactly two users.
///
/// The participant pair is stored normalized (lower uuid first) so that one
/// unique index enforces at-most-one conversation per (product, pair)
/// regardless of who initiated it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub product_id: Uuid,
    pub participants: [Uuid; 2],
    pub last_message_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    /// The participant other than `user_id`, if `user_id` is in the pair.
    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        match self.participants {
            [a, b] if a == user_id => Some(b),
            [a, b] if b == user_id => Some(a),
            _ => None,
        }
    }
}

/// Normalize an unordered participant pair into storage order.
pub fn normalize_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// One row of the caller's conversation list, most recently updated first.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub product_id: Uuid,
    pub other_user_id: Uuid,
    pub unread_count: i32,
    pub last_message: Option<String>,
    /// Timestamp of the last message, or of creation when the thread is
    /// still empty.
    pub last_message_at: DateTime<Utc>,
}
