//! Message history and REST send. The send path reuses the gateway's
//! fan-out so a message posted over HTTP reaches connected participants
//! exactly like one sent over the socket.

use crate::error::AppError;
use crate::middleware::guards::User;
use crate::models::message::render_timestamp;
use crate::models::Message;
use crate::services::ChatStore;
use crate::state::AppState;
use crate::websocket::events;
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageEntry {
    id: Uuid,
    text: String,
    sender_id: Uuid,
    timestamp: String,
    is_read: bool,
}

impl From<&Message> for MessageEntry {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id,
            text: m.content.clone(),
            sender_id: m.sender_id,
            timestamp: render_timestamp(m.created_at),
            is_read: m.is_read(),
        }
    }
}

/// GET /conversations/{id}/messages
/// Full history in send order, participants only.
#[get("/conversations/{id}/messages")]
pub async fn get_messages(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let conversation_id = path.into_inner();
    ChatStore::conversation_for_participant(&state.db, conversation_id, user.id).await?;

    let messages = ChatStore::list_messages(&state.db, conversation_id).await?;
    let entries: Vec<MessageEntry> = messages.iter().map(MessageEntry::from).collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({ "messages": entries })))
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// POST /conversations/{id}/messages
/// Persist and fan out a message for clients without an open socket.
#[post("/conversations/{id}/messages")]
pub async fn send_message(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let conversation_id = path.into_inner();
    let (message, conversation) =
        ChatStore::append_message(&state.db, conversation_id, user.id, &body.content).await?;

    events::fan_out_message(&state.presence, &conversation, &message.to_event()).await;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": MessageEntry::from(&message)
    })))
}
