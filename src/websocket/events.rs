//! Fan-out primitives shared by the gateway and the query API.
//!
//! HTTP handlers route their side effects through the same functions the
//! WebSocket session uses, so a mark-read over REST is observably identical
//! to one over the socket. Delivery failures are isolated per recipient: an
//! offline or broken connection never blocks the rest of the fan-out.

use crate::error::AppResult;
use crate::models::Conversation;
use crate::presence::PresenceTable;
use crate::services::ChatStore;
use crate::websocket::message_types::WsOutboundEvent;
use deadpool_postgres::Pool;
use uuid::Uuid;

/// Deliver one event to a user's registered connection, if any.
pub async fn emit_to_user(presence: &PresenceTable, user_id: Uuid, event: &WsOutboundEvent) -> bool {
    presence.send(user_id, event.to_json()).await
}

/// Deliver a message event to every participant's registered connection,
/// sender included (multi-tab consistency). Offline participants pick the
/// message up later through the query API.
pub async fn fan_out_message(
    presence: &PresenceTable,
    conversation: &Conversation,
    event: &WsOutboundEvent,
) {
    for participant in conversation.participants {
        let delivered = emit_to_user(presence, participant, event).await;
        if !delivered {
            tracing::debug!(user_id = %participant, conversation_id = %conversation.id,
                "participant offline, skipping realtime delivery");
        }
    }
}

/// Tell every participant except the reader that the conversation was read.
pub async fn notify_messages_read(
    presence: &PresenceTable,
    conversation: &Conversation,
    reader_id: Uuid,
) {
    let event = WsOutboundEvent::MessagesRead {
        conversation_id: conversation.id,
        user_id: reader_id,
    };
    for participant in conversation.participants {
        if participant != reader_id {
            emit_to_user(presence, participant, &event).await;
        }
    }
}

/// Broadcast an online/offline transition to everyone who shares a
/// conversation with the user. Covered by the database-gated suite since
/// the partner set comes from the store.
pub async fn notify_user_status(
    db: &Pool,
    presence: &PresenceTable,
    user_id: Uuid,
    is_online: bool,
) -> AppResult<()> {
    let event = WsOutboundEvent::UserStatus { user_id, is_online };
    for partner in ChatStore::conversation_partners(db, user_id).await? {
        emit_to_user(presence, partner, &event).await;
    }
    Ok(())
}
