use axum::{
    debug_handler,
    extract::{ws::{Message as WsMessage, WebSocket}, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{identity::CurrentUser, AppState, CoreError, CoreResult, ErrorBody, UserId};

use super::{live::{LiveRouter, Presence, Subscription}, log::MessageLog, send_message, Message};

/// Frames a client may send over the socket.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Send { to: String, text: String },
    Read { from: String },
}

/// Frames the server sends: pushes for incoming messages plus replies to the
/// client's own frames.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Message { message: Message },
    Sent { message: Message },
    Read { from: UserId, marked: u64 },
    Error {
        #[serde(flatten)]
        error: ErrorBody,
    },
}

#[debug_handler(state = AppState)]
pub(crate) async fn chat_ws(
    CurrentUser(user_id): CurrentUser,
    State(log): State<MessageLog>,
    State(live): State<LiveRouter>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, user_id, log, live))
}

async fn serve_socket(socket: WebSocket, user_id: UserId, log: MessageLog, live: LiveRouter) {
    let Subscription { channel_id, mut receiver } = live.register(&user_id);
    let (mut sender, mut stream) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerFrame>(16);

    let mut push_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                pushed = receiver.recv() => match pushed {
                    Some(message) => ServerFrame::Message { message },
                    // replaced by a newer connection
                    None => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            if sender.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.send(WsMessage::Close(None)).await;
    });

    let recv_user = user_id.clone();
    let recv_live = live.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            let text = match msg {
                WsMessage::Text(text) => text,
                WsMessage::Close(_) => break,
                _ => continue,
            };

            let reply = match serde_json::from_str::<ClientFrame>(text.as_str()) {
                Ok(frame) => handle_frame(&log, &recv_live, &recv_user, frame).await,
                Err(err) => Err(CoreError::validation("frame", err.to_string())),
            };
            let reply = reply.unwrap_or_else(|err| ServerFrame::Error {
                error: ErrorBody::from(&err),
            });

            if reply_tx.send(reply).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut push_task => recv_task.abort(),
        _ = &mut recv_task => push_task.abort(),
    };

    live.unregister(&user_id, channel_id);
    // a newer socket may have taken over the registration
    let replaced = matches!(live.presence(&user_id), Presence::Online { .. });
    info!(%user_id, channel_id, replaced, online = live.online_count(), "socket closed");
}

async fn handle_frame(
    log: &MessageLog,
    live: &LiveRouter,
    user_id: &UserId,
    frame: ClientFrame,
) -> CoreResult<ServerFrame> {
    match frame {
        ClientFrame::Send { to, text } => {
            let to = UserId::parse(&to)?;
            let message = send_message(log, live, user_id, &to, &text).await?;
            Ok(ServerFrame::Sent { message })
        }
        ClientFrame::Read { from } => {
            let from = UserId::parse(&from)?;
            let marked = log.mark_read(user_id, &from).await?;
            debug!(%from, marked, "read over socket");
            Ok(ServerFrame::Read { from, marked })
        }
    }
}
