use axum::{debug_handler, extract::{Path, Query, State}, Json};
use uuid::Uuid;

use crate::{identity::CurrentUser, AppResult, AppState};

use super::{store::{EventFilter, Events}, EventView};

#[debug_handler(state = AppState)]
pub(crate) async fn list_events(
    CurrentUser(_): CurrentUser,
    State(events): State<Events>,
    Query(filter): Query<EventFilter>,
) -> AppResult<Json<Vec<EventView>>> {
    let events = events.list_upcoming(&filter).await?;
    Ok(Json(events.into_iter().map(EventView::from).collect()))
}

#[debug_handler(state = AppState)]
pub(crate) async fn event(
    CurrentUser(_): CurrentUser,
    Path(event_id): Path<Uuid>,
    State(events): State<Events>,
) -> AppResult<Json<EventView>> {
    Ok(Json(events.get(event_id).await?.into()))
}
