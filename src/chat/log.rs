use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{db, CoreError, CoreResult, UserId};

use super::{conversations, Message};

pub const DEFAULT_PAGE: u32 = 50;
const MAX_PAGE: u32 = 500;

#[derive(sqlx::FromRow)]
pub(crate) struct MessageRow {
    id: String,
    sender_id: UserId,
    receiver_id: UserId,
    body: String,
    created_at: i64,
    read: bool,
}

impl TryFrom<MessageRow> for Message {
    type Error = CoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: Uuid::parse_str(&row.id)?,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            text: row.body,
            created_at: db::from_micros(row.created_at),
            read: row.read,
        })
    }
}

/// Append-only store of direct messages.
#[derive(Clone)]
pub struct MessageLog {
    db_pool: SqlitePool,
    max_len: usize,
}

impl MessageLog {
    pub fn new(db_pool: SqlitePool, max_len: usize) -> Self {
        Self { db_pool, max_len }
    }

    /// Stores a message with a server-assigned id and timestamp. The
    /// conversation summaries of both parties are updated in the same
    /// transaction.
    #[instrument(skip_all, fields(sender = %sender_id, receiver = %receiver_id))]
    pub async fn append(&self, sender_id: &UserId, receiver_id: &UserId, text: &str) -> CoreResult<Message> {
        if sender_id == receiver_id {
            return Err(CoreError::validation("receiver", "cannot message yourself"));
        }
        if text.trim().is_empty() {
            return Err(CoreError::validation("text", "must not be empty"));
        }
        if text.chars().count() > self.max_len {
            return Err(CoreError::validation(
                "text",
                format!("longer than {} characters", self.max_len),
            ));
        }

        let message = Message {
            id: Uuid::now_v7(),
            sender_id: sender_id.clone(),
            receiver_id: receiver_id.clone(),
            text: text.to_owned(),
            created_at: db::now(),
            read: false,
        };

        let mut tx = self.db_pool.begin().await?;
        sqlx::query("INSERT INTO messages (id,sender_id,receiver_id,body,created_at,read) values (?,?,?,?,?,0)")
            .bind(message.id.to_string())
            .bind(&message.sender_id)
            .bind(&message.receiver_id)
            .bind(&message.text)
            .bind(db::to_micros(message.created_at))
            .execute(&mut *tx)
            .await?;
        conversations::apply_append(&mut tx, &message).await?;
        tx.commit().await?;

        debug!(id = %message.id, "message appended");
        Ok(message)
    }

    /// Marks everything `sender_id` sent to `receiver_id` so far as read.
    /// Returns how many messages changed; repeating the call changes nothing.
    pub async fn mark_read(&self, receiver_id: &UserId, sender_id: &UserId) -> CoreResult<u64> {
        self.mark(receiver_id, sender_id, None).await
    }

    /// Marks as read only the messages from `sender_id` that fall inside
    /// `page`, a slice returned by [`MessageLog::messages_between`]. Anything
    /// older, newer or appended meanwhile keeps its state.
    pub async fn mark_page_read(&self, receiver_id: &UserId, sender_id: &UserId, page: &[Message]) -> CoreResult<u64> {
        match (page.first(), page.last()) {
            (Some(first), Some(last)) => self.mark(receiver_id, sender_id, Some((first, last))).await,
            _ => Ok(0),
        }
    }

    #[instrument(skip_all, fields(receiver = %receiver_id, sender = %sender_id, bounded = span.is_some()))]
    async fn mark(
        &self,
        receiver_id: &UserId,
        sender_id: &UserId,
        span: Option<(&Message, &Message)>,
    ) -> CoreResult<u64> {
        let mut tx = self.db_pool.begin().await?;
        let marked = match span {
            None => {
                sqlx::query("UPDATE messages SET read=1 WHERE receiver_id=? AND sender_id=? AND read=0")
                    .bind(receiver_id)
                    .bind(sender_id)
                    .execute(&mut *tx)
                    .await?
            }
            Some((first, last)) => {
                sqlx::query(
                    "UPDATE messages SET read=1 WHERE receiver_id=? AND sender_id=? AND read=0
                     AND (created_at, id) >= (?, ?) AND (created_at, id) <= (?, ?)",
                )
                .bind(receiver_id)
                .bind(sender_id)
                .bind(db::to_micros(first.created_at))
                .bind(first.id.to_string())
                .bind(db::to_micros(last.created_at))
                .bind(last.id.to_string())
                .execute(&mut *tx)
                .await?
            }
        }
        .rows_affected();
        conversations::apply_read(&mut tx, receiver_id, sender_id).await?;
        tx.commit().await?;

        Ok(marked)
    }

    /// Messages exchanged by one pair, oldest first.
    ///
    /// With `after`, returns up to `limit` messages newer than that instant;
    /// otherwise the latest `limit` messages.
    pub async fn messages_between(
        &self,
        user_id: &UserId,
        other_id: &UserId,
        after: Option<DateTime<Utc>>,
        limit: Option<u32>,
    ) -> CoreResult<Vec<Message>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
        let pair = "((sender_id=?1 AND receiver_id=?2) OR (sender_id=?2 AND receiver_id=?1))";

        let rows: Vec<MessageRow> = match after {
            Some(after) => {
                sqlx::query_as(&format!(
                    "SELECT id,sender_id,receiver_id,body,created_at,read FROM messages
                     WHERE {pair} AND created_at > ?3 ORDER BY created_at ASC, id ASC LIMIT ?4"
                ))
                .bind(user_id)
                .bind(other_id)
                .bind(db::to_micros(after))
                .bind(i64::from(limit))
                .fetch_all(&self.db_pool)
                .await?
            }
            None => {
                let mut rows: Vec<MessageRow> = sqlx::query_as(&format!(
                    "SELECT id,sender_id,receiver_id,body,created_at,read FROM messages
                     WHERE {pair} ORDER BY created_at DESC, id DESC LIMIT ?3"
                ))
                .bind(user_id)
                .bind(other_id)
                .bind(i64::from(limit))
                .fetch_all(&self.db_pool)
                .await?;
                rows.reverse();
                rows
            }
        };

        rows.into_iter().map(Message::try_from).collect()
    }

    /// Every message sent or received by `user_id`, newest first.
    pub async fn involving(&self, user_id: &UserId) -> CoreResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id,sender_id,receiver_id,body,created_at,read FROM messages
             WHERE sender_id=?1 OR receiver_id=?1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }
}
