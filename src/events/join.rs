use axum::{debug_handler, extract::{Path, State}, Json};
use uuid::Uuid;

use crate::{identity::CurrentUser, AppResult, AppState};

use super::{roster::Roster, EventView};

#[debug_handler(state = AppState)]
pub(crate) async fn join_event(
    CurrentUser(user_id): CurrentUser,
    Path(event_id): Path<Uuid>,
    State(roster): State<Roster>,
) -> AppResult<Json<EventView>> {
    let event = roster.try_enroll(event_id, &user_id).await?;
    Ok(Json(event.into()))
}
