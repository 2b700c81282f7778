use axum::{debug_handler, extract::{rejection::JsonRejection, Path, State}, Json};

use crate::{identity::CurrentUser, AppResult, AppState, CoreError, UserId};

use super::{Profile, ProfilePatch, Profiles};

#[debug_handler(state = AppState)]
pub(crate) async fn own_profile(
    CurrentUser(user_id): CurrentUser,
    State(profiles): State<Profiles>,
) -> AppResult<Json<Profile>> {
    Ok(Json(profiles.get(&user_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn profile(
    CurrentUser(_): CurrentUser,
    Path(user_id): Path<String>,
    State(profiles): State<Profiles>,
) -> AppResult<Json<Profile>> {
    let user_id = UserId::parse(&user_id)?;
    Ok(Json(profiles.get(&user_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_profile(
    CurrentUser(user_id): CurrentUser,
    State(profiles): State<Profiles>,
    patch: Result<Json<ProfilePatch>, JsonRejection>,
) -> AppResult<Json<Profile>> {
    let Json(patch) = patch.map_err(|rejection| CoreError::validation("profile", rejection.body_text()))?;
    Ok(Json(profiles.update(&user_id, patch).await?))
}
