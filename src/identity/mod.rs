//! Identity is resolved by an external provider; this crate never validates
//! credentials itself. Requests carry either a bearer token or a session
//! cookie established through `POST /session`.

mod firebase;
mod session;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    routing::post,
    Router,
};
use tower_sessions::Session;

use crate::{AppError, AppState, CoreError, CoreResult, UserId};

pub use firebase::FirebaseIdentity;

pub(crate) const USER_ID: &str = "user_id";

/// Port to the identity provider: token in, stable user id out.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> CoreResult<UserId>;
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(session::login).delete(session::logout))
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    Arc<dyn IdentityProvider>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(token) = bearer_token(&parts.headers) {
            let identity = Arc::<dyn IdentityProvider>::from_ref(state);
            return Ok(CurrentUser(identity.resolve(&token).await?));
        }

        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| CoreError::unauthenticated(msg))?;
        let Some(user_id) = session.get::<UserId>(USER_ID).await? else {
            return Err(CoreError::unauthenticated("missing bearer token or session").into());
        };

        Ok(CurrentUser(user_id))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_owned())
}
