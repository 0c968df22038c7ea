//! Conversation query API: cold-load listing, find-or-create, detail and
//! mark-as-read for clients without an open realtime connection. Shares the
//! store and the broadcast primitives with the gateway so both paths have
//! the same observable effects.

use crate::error::AppError;
use crate::middleware::guards::User;
use crate::services::directory::{ProductSummary, UserSummary};
use crate::services::{ChatStore, Directory};
use crate::state::AppState;
use crate::websocket::events;
use actix_web::{get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationListEntry {
    id: Uuid,
    user_id: Uuid,
    user_name: String,
    user_avatar: String,
    product_id: Uuid,
    product_title: String,
    product_image: String,
    last_message: String,
    last_message_time: DateTime<Utc>,
    unread_count: i32,
    is_online: bool,
}

/// GET /conversations
/// The caller's conversations, most recently updated first, annotated with
/// the other participant and product context.
#[get("/conversations")]
pub async fn get_conversations(
    state: web::Data<AppState>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let summaries = ChatStore::list_conversations(&state.db, user.id).await?;

    let mut entries = Vec::with_capacity(summaries.len());
    for summary in summaries {
        let other = Directory::user_or_placeholder(&state.db, summary.other_user_id).await?;
        let product = Directory::product_or_placeholder(&state.db, summary.product_id).await?;

        entries.push(ConversationListEntry {
            id: summary.id,
            user_id: other.id,
            user_name: other.name,
            user_avatar: other.avatar,
            product_id: product.id,
            product_title: product.title,
            product_image: product.image,
            last_message: summary.last_message.unwrap_or_default(),
            last_message_time: summary.last_message_at,
            unread_count: summary.unread_count,
            is_online: state.presence.is_online(summary.other_user_id).await,
        });
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "conversations": entries })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub product_id: Uuid,
    pub other_user_id: Uuid,
}

#[derive(Serialize)]
struct ConversationDetail {
    id: Uuid,
    product: ProductSummary,
    user: DetailUser,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetailUser {
    id: Uuid,
    name: String,
    avatar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_online: Option<bool>,
}

impl From<UserSummary> for DetailUser {
    fn from(u: UserSummary) -> Self {
        Self {
            id: u.id,
            name: u.name,
            avatar: u.avatar,
            is_online: None,
        }
    }
}

/// POST /conversations
/// Find or create the thread for (product, caller, other user). Idempotent:
/// both participants calling concurrently end up with the same conversation.
#[post("/conversations")]
pub async fn create_conversation(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<CreateConversationRequest>,
) -> Result<HttpResponse, AppError> {
    let other = Directory::user(&state.db, body.other_user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let conversation = ChatStore::find_or_create_conversation(
        &state.db,
        body.product_id,
        user.id,
        body.other_user_id,
    )
    .await?;

    let product = Directory::product_or_placeholder(&state.db, body.product_id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "conversation": ConversationDetail {
            id: conversation.id,
            product,
            user: other.into(),
        }
    })))
}

/// GET /conversations/{id}
/// Participant-only detail; strangers get the same 404 as a missing id.
#[get("/conversations/{id}")]
pub async fn get_conversation(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let conversation_id = path.into_inner();
    let conversation =
        ChatStore::conversation_for_participant(&state.db, conversation_id, user.id).await?;

    let other_id = conversation
        .other_participant(user.id)
        .ok_or(AppError::NotFound)?;
    let other = Directory::user(&state.db, other_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let product = Directory::product_or_placeholder(&state.db, conversation.product_id).await?;

    let mut detail_user = DetailUser::from(other);
    detail_user.is_online = Some(state.presence.is_online(other_id).await);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "conversation": ConversationDetail {
            id: conversation.id,
            product,
            user: detail_user,
        }
    })))
}

/// POST /conversations/{id}/read
/// Mark-as-read for clients without an open socket. Emits the same
/// `messagesRead` event to connected participants as the gateway path.
#[post("/conversations/{id}/read")]
pub async fn mark_conversation_read(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let conversation_id = path.into_inner();
    let (conversation, flipped) =
        ChatStore::mark_read(&state.db, conversation_id, user.id).await?;

    tracing::debug!(%conversation_id, reader = %user.id, flipped, "conversation marked read");
    events::notify_messages_read(&state.presence, &conversation, user.id).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
