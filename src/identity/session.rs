use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::info;

use crate::{AppResult, AppState, UserId};

use super::{IdentityProvider, USER_ID};

#[derive(Deserialize)]
pub(crate) struct LoginInput {
    token: String,
}

#[derive(Serialize)]
pub(crate) struct LoginResponse {
    user_id: UserId,
}

/// Trades a provider token for a session cookie, for clients that cannot set
/// headers (browser websockets).
#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(identity): State<Arc<dyn IdentityProvider>>,
    session: Session,
    Json(LoginInput { token }): Json<LoginInput>,
) -> AppResult<Json<LoginResponse>> {
    let user_id = identity.resolve(&token).await?;
    session.cycle_id().await?;
    session.insert(USER_ID, &user_id).await?;

    info!(%user_id, "session established");
    Ok(Json(LoginResponse { user_id }))
}

#[debug_handler]
pub(crate) async fn logout(session: Session) -> AppResult<StatusCode> {
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}
