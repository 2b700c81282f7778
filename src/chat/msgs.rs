use axum::{debug_handler, extract::{Path, Query, State}, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{identity::CurrentUser, AppResult, AppState, UserId};

use super::{
    conversations::{Conversation, ConversationIndex},
    live::LiveRouter,
    log::MessageLog,
    send_message, Message,
};

#[derive(Deserialize)]
pub(crate) struct MessagesQuery {
    after: Option<DateTime<Utc>>,
    limit: Option<u32>,
}

#[derive(Deserialize)]
pub(crate) struct SendMessageInput {
    text: String,
}

#[derive(Serialize)]
pub(crate) struct MarkReadResponse {
    marked: u64,
}

#[debug_handler(state = AppState)]
pub(crate) async fn conversations(
    CurrentUser(user_id): CurrentUser,
    State(index): State<ConversationIndex>,
) -> AppResult<Json<Vec<Conversation>>> {
    Ok(Json(index.list_conversations(&user_id).await?))
}

/// History with one counterpart. The counterpart's messages in the returned
/// page count as read.
#[debug_handler(state = AppState)]
pub(crate) async fn messages(
    CurrentUser(user_id): CurrentUser,
    Path(other): Path<String>,
    Query(MessagesQuery { after, limit }): Query<MessagesQuery>,
    State(log): State<MessageLog>,
) -> AppResult<Json<Vec<Message>>> {
    let other = UserId::parse(&other)?;
    let messages = log.messages_between(&user_id, &other, after, limit).await?;
    log.mark_page_read(&user_id, &other, &messages).await?;

    Ok(Json(messages))
}

#[debug_handler(state = AppState)]
pub(crate) async fn send(
    CurrentUser(user_id): CurrentUser,
    Path(other): Path<String>,
    State(log): State<MessageLog>,
    State(live): State<LiveRouter>,
    Json(SendMessageInput { text }): Json<SendMessageInput>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let other = UserId::parse(&other)?;
    let message = send_message(&log, &live, &user_id, &other, &text).await?;

    Ok((StatusCode::CREATED, Json(message)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn mark_read(
    CurrentUser(user_id): CurrentUser,
    Path(other): Path<String>,
    State(log): State<MessageLog>,
) -> AppResult<Json<MarkReadResponse>> {
    let other = UserId::parse(&other)?;
    let marked = log.mark_read(&user_id, &other).await?;

    Ok(Json(MarkReadResponse { marked }))
}
