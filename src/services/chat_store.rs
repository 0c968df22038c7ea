//! Conversation store adapter.
//!
//! Owns every read and mutation of conversations, messages, read receipts
//! and unread counters. Unread counters are only ever touched through
//! single-statement atomic updates so concurrent appends and read sweeps
//! cannot lose increments. A non-participant querying a conversation gets
//! the same `NotFound` as a nonexistent id.

use crate::error::{AppError, AppResult};
use crate::models::conversation::{normalize_pair, Conversation, ConversationSummary};
use crate::models::message::{Message, MessageStatus};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

pub struct ChatStore;

fn conversation_from_row(row: &Row) -> Conversation {
    Conversation {
        id: row.get("id"),
        product_id: row.get("product_id"),
        participants: [row.get("participant_low"), row.get("participant_high")],
        last_message_id: row.get("last_message_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn message_from_row(row: &Row) -> AppResult<Message> {
    let status: String = row.get("status");
    Ok(Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        message_type: row.get("message_type"),
        status: MessageStatus::from_db(&status).ok_or(AppError::Internal)?,
        created_at: row.get("created_at"),
    })
}

const CONVERSATION_COLS: &str =
    "id, product_id, participant_low, participant_high, last_message_id, created_at, updated_at";

impl ChatStore {
    /// Look up the conversation for this product and unordered pair,
    /// creating it (with both unread counters at zero) when absent.
    ///
    /// The unique index on (product, low, high) is the serialization point:
    /// when both participants race to create, one insert is a no-op and the
    /// loser re-reads the winner's row.
    pub async fn find_or_create_conversation(
        db: &Pool,
        product_id: Uuid,
        user_a: Uuid,
        user_b: Uuid,
    ) -> AppResult<Conversation> {
        if user_a == user_b {
            return Err(AppError::BadRequest(
                "cannot start a conversation with yourself".into(),
            ));
        }
        let (low, high) = normalize_pair(user_a, user_b);

        let lookup = format!(
            "SELECT {CONVERSATION_COLS} FROM conversations \
             WHERE product_id = $1 AND participant_low = $2 AND participant_high = $3"
        );

        let mut client = db.get().await?;
        if let Some(row) = client.query_opt(&lookup, &[&product_id, &low, &high]).await? {
            return Ok(conversation_from_row(&row));
        }

        let id = Uuid::new_v4();
        let tx = client.transaction().await?;
        let inserted = tx
            .query_opt(
                &format!(
                    "INSERT INTO conversations (id, product_id, participant_low, participant_high) \
                     VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (product_id, participant_low, participant_high) DO NOTHING \
                     RETURNING {CONVERSATION_COLS}"
                ),
                &[&id, &product_id, &low, &high],
            )
            .await?;

        match inserted {
            Some(row) => {
                tx.execute(
                    "INSERT INTO conversation_unread_counts (conversation_id, user_id, count) \
                     VALUES ($1, $2, 0), ($1, $3, 0) ON CONFLICT DO NOTHING",
                    &[&id, &low, &high],
                )
                .await?;
                tx.commit().await?;
                Ok(conversation_from_row(&row))
            }
            None => {
                // Lost the creation race; the other participant's insert won.
                tx.rollback().await?;
                let row = client
                    .query_opt(&lookup, &[&product_id, &low, &high])
                    .await?
                    .ok_or(AppError::Internal)?;
                Ok(conversation_from_row(&row))
            }
        }
    }

    /// Fetch a conversation on behalf of `user_id`. Absent conversations and
    /// conversations the user is not part of are indistinguishable.
    pub async fn conversation_for_participant(
        db: &Pool,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Conversation> {
        let client = db.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {CONVERSATION_COLS} FROM conversations WHERE id = $1"),
                &[&conversation_id],
            )
            .await?
            .ok_or(AppError::NotFound)?;

        let conversation = conversation_from_row(&row);
        if !conversation.is_participant(user_id) {
            return Err(AppError::NotFound);
        }
        Ok(conversation)
    }

    /// Persist a message and, in the same transaction, advance the
    /// conversation's last-message pointer and increment the recipient's
    /// unread counter. Either everything lands or nothing does.
    pub async fn append_message(
        db: &Pool,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<(Message, Conversation)> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::BadRequest("message content cannot be empty".into()));
        }

        let mut client = db.get().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_opt(
                &format!("SELECT {CONVERSATION_COLS} FROM conversations WHERE id = $1"),
                &[&conversation_id],
            )
            .await?
            .ok_or(AppError::NotFound)?;
        let mut conversation = conversation_from_row(&row);
        if !conversation.is_participant(sender_id) {
            return Err(AppError::Forbidden);
        }

        let message_id = Uuid::new_v4();
        let inserted = tx
            .query_one(
                "INSERT INTO messages (id, conversation_id, sender_id, content) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, conversation_id, sender_id, content, message_type, status, created_at",
                &[&message_id, &conversation_id, &sender_id, &content],
            )
            .await?;
        let message = message_from_row(&inserted)?;

        tx.execute(
            "UPDATE conversations SET last_message_id = $2, updated_at = NOW() WHERE id = $1",
            &[&conversation_id, &message_id],
        )
        .await?;

        // Atomic increment for everyone but the sender; a row is created
        // lazily if the counter does not exist yet.
        for participant in conversation.participants {
            if participant == sender_id {
                continue;
            }
            tx.execute(
                "INSERT INTO conversation_unread_counts (conversation_id, user_id, count) \
                 VALUES ($1, $2, 1) \
                 ON CONFLICT (conversation_id, user_id) \
                 DO UPDATE SET count = conversation_unread_counts.count + 1",
                &[&conversation_id, &participant],
            )
            .await?;
        }

        tx.commit().await?;
        conversation.last_message_id = Some(message_id);
        Ok((message, conversation))
    }

    /// Read sweep in one transaction: flip every message not sent by the
    /// reader to `read`, append read receipts, and zero the reader's unread
    /// counter. Messages appended after the sweep's snapshot stay
    /// unread, which is allowed; a message can never be flipped before it
    /// exists, and the reader's own messages are never touched.
    ///
    /// Returns the conversation and how many messages were flipped.
    pub async fn mark_read(
        db: &Pool,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> AppResult<(Conversation, u64)> {
        let mut client = db.get().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_opt(
                &format!("SELECT {CONVERSATION_COLS} FROM conversations WHERE id = $1"),
                &[&conversation_id],
            )
            .await?
            .ok_or(AppError::NotFound)?;
        let conversation = conversation_from_row(&row);
        if !conversation.is_participant(reader_id) {
            return Err(AppError::Forbidden);
        }

        let flipped = tx
            .execute(
                "WITH flipped AS ( \
                     UPDATE messages SET status = 'read' \
                     WHERE conversation_id = $1 AND sender_id <> $2 AND status <> 'read' \
                     RETURNING id \
                 ) \
                 INSERT INTO message_reads (message_id, user_id) \
                 SELECT id, $2 FROM flipped \
                 ON CONFLICT DO NOTHING",
                &[&conversation_id, &reader_id],
            )
            .await?;

        tx.execute(
            "UPDATE conversation_unread_counts SET count = 0 \
             WHERE conversation_id = $1 AND user_id = $2",
            &[&conversation_id, &reader_id],
        )
        .await?;

        tx.commit().await?;
        Ok((conversation, flipped))
    }

    /// The caller's conversations, most recently updated first, each with
    /// the caller's unread count and the last message preview.
    pub async fn list_conversations(
        db: &Pool,
        user_id: Uuid,
    ) -> AppResult<Vec<ConversationSummary>> {
        let client = db.get().await?;
        let rows = client
            .query(
                "SELECT c.id, c.product_id, c.participant_low, c.participant_high, \
                        COALESCE(u.count, 0) AS unread_count, \
                        lm.content AS last_message, \
                        COALESCE(lm.created_at, c.created_at) AS last_message_at \
                 FROM conversations c \
                 LEFT JOIN conversation_unread_counts u \
                        ON u.conversation_id = c.id AND u.user_id = $1 \
                 LEFT JOIN messages lm ON lm.id = c.last_message_id \
                 WHERE c.participant_low = $1 OR c.participant_high = $1 \
                 ORDER BY c.updated_at DESC \
                 LIMIT 100",
                &[&user_id],
            )
            .await?;

        let summaries = rows
            .into_iter()
            .map(|row| {
                let low: Uuid = row.get("participant_low");
                let high: Uuid = row.get("participant_high");
                ConversationSummary {
                    id: row.get("id"),
                    product_id: row.get("product_id"),
                    other_user_id: if low == user_id { high } else { low },
                    unread_count: row.get("unread_count"),
                    last_message: row.get("last_message"),
                    last_message_at: row.get("last_message_at"),
                }
            })
            .collect();

        Ok(summaries)
    }

    /// Full message history of a conversation, oldest first. Authorization
    /// is the caller's concern (`conversation_for_participant`).
    pub async fn list_messages(db: &Pool, conversation_id: Uuid) -> AppResult<Vec<Message>> {
        let client = db.get().await?;
        let rows = client
            .query(
                "SELECT id, conversation_id, sender_id, content, message_type, status, created_at \
                 FROM messages WHERE conversation_id = $1 ORDER BY created_at ASC",
                &[&conversation_id],
            )
            .await?;

        rows.iter().map(message_from_row).collect()
    }

    /// Every distinct user sharing at least one conversation with `user_id`.
    /// Drives the `userStatus` presence broadcast.
    pub async fn conversation_partners(db: &Pool, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        let client = db.get().await?;
        let rows = client
            .query(
                "SELECT DISTINCT CASE WHEN participant_low = $1 \
                                      THEN participant_high ELSE participant_low END AS partner \
                 FROM conversations \
                 WHERE participant_low = $1 OR participant_high = $1",
                &[&user_id],
            )
            .await?;
        Ok(rows.into_iter().map(|row| row.get("partner")).collect())
    }

    /// The caller's unread count for one conversation.
    pub async fn unread_count(
        db: &Pool,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<i32> {
        let client = db.get().await?;
        let row = client
            .query_opt(
                "SELECT count FROM conversation_unread_counts \
                 WHERE conversation_id = $1 AND user_id = $2",
                &[&conversation_id, &user_id],
            )
            .await?;
        Ok(row.map(|r| r.get("count")).unwrap_or(0))
    }
}
