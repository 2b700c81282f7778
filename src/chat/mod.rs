pub mod conversations;
pub mod live;
pub mod log;
mod msgs;
mod ws;

use axum::{routing::{get, post}, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::{AppState, CoreResult, UserId};

use live::LiveRouter;
use log::MessageLog;

pub use ws::{ClientFrame, ServerFrame};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(msgs::conversations))
        .route("/ws", get(ws::chat_ws))
        .route("/{user_id}/messages", get(msgs::messages).post(msgs::send))
        .route("/{user_id}/read", post(msgs::mark_read))
}

/// A direct message. Only `read` ever changes after the append.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Persists the message, then pushes it to the receiver if they are online.
/// The message is durable before any push is attempted.
pub async fn send_message(
    log: &MessageLog,
    live: &LiveRouter,
    sender_id: &UserId,
    receiver_id: &UserId,
    text: &str,
) -> CoreResult<Message> {
    let message = log.append(sender_id, receiver_id, text).await?;
    let pushed = live.fan_out(&message);
    debug!(id = %message.id, pushed, "message delivered");
    Ok(message)
}
