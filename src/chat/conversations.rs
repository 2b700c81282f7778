use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{db, CoreResult, UserId};

use super::{log::MessageLog, Message};

/// Summary of one counterpart, from the point of view of its owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    pub counterpart_id: UserId,
    pub last_message_id: Uuid,
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
    /// Messages sent to the owner that are still unread.
    pub unread_count: u32,
}

/// Per-user conversation summaries, maintained on every append.
#[derive(Clone)]
pub struct ConversationIndex {
    db_pool: SqlitePool,
}

impl ConversationIndex {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// One entry per counterpart, most recent first.
    pub async fn list_conversations(&self, user_id: &UserId) -> CoreResult<Vec<Conversation>> {
        let rows: Vec<(UserId, String, String, i64, i64)> = sqlx::query_as(
            "SELECT counterpart_id,last_message_id,last_message,last_message_at,unread_count
             FROM conversations WHERE owner_id=?
             ORDER BY last_message_at DESC, last_message_id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter()
            .map(|(counterpart_id, id, last_message, at, unread)| {
                Ok(Conversation {
                    counterpart_id,
                    last_message_id: Uuid::parse_str(&id)?,
                    last_message,
                    last_message_time: db::from_micros(at),
                    unread_count: unread.max(0) as u32,
                })
            })
            .collect()
    }
}

/// Derives the same summaries as [`ConversationIndex::list_conversations`] by
/// scanning the whole log. O(messages), used to verify or rebuild the index.
pub async fn scan_conversations(log: &MessageLog, user_id: &UserId) -> CoreResult<Vec<Conversation>> {
    Ok(summarize(user_id, log.involving(user_id).await?))
}

/// `messages` must be ordered newest first.
fn summarize(user_id: &UserId, messages: Vec<Message>) -> Vec<Conversation> {
    let mut conversations: Vec<Conversation> = Vec::new();
    let mut slots: HashMap<UserId, usize> = HashMap::new();

    for message in messages {
        let incoming = &message.receiver_id == user_id;
        let counterpart_id = if incoming {
            message.sender_id.clone()
        } else {
            message.receiver_id.clone()
        };
        let unread = u32::from(incoming && !message.read);

        match slots.get(&counterpart_id) {
            Some(&slot) => conversations[slot].unread_count += unread,
            None => {
                slots.insert(counterpart_id.clone(), conversations.len());
                conversations.push(Conversation {
                    counterpart_id,
                    last_message_id: message.id,
                    last_message: message.text,
                    last_message_time: message.created_at,
                    unread_count: unread,
                });
            }
        }
    }

    conversations
}

pub(crate) async fn apply_append(conn: &mut SqliteConnection, message: &Message) -> CoreResult<()> {
    upsert(conn, &message.sender_id, &message.receiver_id, message, 0).await?;
    upsert(conn, &message.receiver_id, &message.sender_id, message, 1).await
}

pub(crate) async fn apply_read(conn: &mut SqliteConnection, owner_id: &UserId, counterpart_id: &UserId) -> CoreResult<()> {
    sqlx::query(
        "UPDATE conversations SET unread_count = (
            SELECT COUNT(*) FROM messages WHERE receiver_id=?1 AND sender_id=?2 AND read=0
         ) WHERE owner_id=?1 AND counterpart_id=?2",
    )
    .bind(owner_id)
    .bind(counterpart_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// The latest message wins by (timestamp, id), the same order the scan uses.
async fn upsert(
    conn: &mut SqliteConnection,
    owner_id: &UserId,
    counterpart_id: &UserId,
    message: &Message,
    unread: i64,
) -> CoreResult<()> {
    sqlx::query(
        "INSERT INTO conversations (owner_id,counterpart_id,last_message_id,last_message,last_message_at,unread_count)
         VALUES (?,?,?,?,?,?)
         ON CONFLICT (owner_id, counterpart_id) DO UPDATE SET
            unread_count = conversations.unread_count + excluded.unread_count,
            last_message_id = CASE WHEN (excluded.last_message_at, excluded.last_message_id) > (conversations.last_message_at, conversations.last_message_id)
                THEN excluded.last_message_id ELSE conversations.last_message_id END,
            last_message = CASE WHEN (excluded.last_message_at, excluded.last_message_id) > (conversations.last_message_at, conversations.last_message_id)
                THEN excluded.last_message ELSE conversations.last_message END,
            last_message_at = MAX(excluded.last_message_at, conversations.last_message_at)",
    )
    .bind(owner_id)
    .bind(counterpart_id)
    .bind(message.id.to_string())
    .bind(&message.text)
    .bind(db::to_micros(message.created_at))
    .bind(unread)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
