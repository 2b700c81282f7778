use axum::{debug_handler, extract::State, http::StatusCode, Json};

use crate::{identity::CurrentUser, AppResult, AppState};

use super::{store::{Events, NewEvent}, EventView};

#[debug_handler(state = AppState)]
pub(crate) async fn new_event(
    CurrentUser(user_id): CurrentUser,
    State(events): State<Events>,
    Json(new_event): Json<NewEvent>,
) -> AppResult<(StatusCode, Json<EventView>)> {
    let event = events.create(&user_id, new_event).await?;
    Ok((StatusCode::CREATED, Json(event.into())))
}
