use axum::{debug_handler, extract::{Path, State}, Json};
use serde::{Deserialize, Serialize};

use crate::{identity::CurrentUser, AppResult, AppState, UserId};

use super::{reciprocity::{ConnectionResult, ReciprocityDetector}, Direction, SwipeRecord};

#[derive(Deserialize)]
pub(crate) struct SwipeInput {
    swiped_id: String,
    direction: Direction,
}

#[derive(Serialize)]
pub(crate) struct SwipeResponse {
    swipe: SwipeRecord,
    is_connection: bool,
}

#[debug_handler(state = AppState)]
pub(crate) async fn swipe(
    CurrentUser(user_id): CurrentUser,
    State(reciprocity): State<ReciprocityDetector>,
    Json(SwipeInput { swiped_id, direction }): Json<SwipeInput>,
) -> AppResult<Json<SwipeResponse>> {
    let swiped_id = UserId::parse(&swiped_id)?;
    let (swipe, ConnectionResult { is_connection }) =
        reciprocity.swipe(&user_id, &swiped_id, direction).await?;

    Ok(Json(SwipeResponse { swipe, is_connection }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn connections(
    CurrentUser(user_id): CurrentUser,
    State(reciprocity): State<ReciprocityDetector>,
) -> AppResult<Json<Vec<UserId>>> {
    Ok(Json(reciprocity.connections_of(&user_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn connection(
    CurrentUser(user_id): CurrentUser,
    Path(other): Path<String>,
    State(reciprocity): State<ReciprocityDetector>,
) -> AppResult<Json<ConnectionResult>> {
    let other = UserId::parse(&other)?;
    Ok(Json(reciprocity.check_pair(&user_id, &other).await?))
}
