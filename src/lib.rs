pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod identity;
pub mod profiles;
pub mod swipes;

use std::{fmt, sync::Arc};

use axum::{extract::{FromRef, State}, http::StatusCode, response::{IntoResponse, Response}, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

use chat::{conversations::ConversationIndex, live::LiveRouter, log::MessageLog};
use config::Config;
use events::{roster::Roster, store::Events};
use identity::IdentityProvider;
use profiles::Profiles;
use swipes::{ledger::SwipeLedger, reciprocity::ReciprocityDetector};

pub use error::{CoreError, CoreResult};

/// Opaque, stable id handed out by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(String);

impl UserId {
    const MAX_LEN: usize = 128;

    /// Validates an id coming from outside (path segments, request bodies).
    pub fn parse(raw: &str) -> CoreResult<Self> {
        if raw.is_empty() {
            return Err(CoreError::validation("user id", "must not be empty"));
        }
        if raw.len() > Self::MAX_LEN {
            return Err(CoreError::validation(
                "user id",
                format!("longer than {} bytes", Self::MAX_LEN),
            ));
        }
        if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(CoreError::validation("user id", "contains whitespace"));
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub identity: Arc<dyn IdentityProvider>,
    pub reciprocity: ReciprocityDetector,
    pub events: Events,
    pub roster: Roster,
    pub log: MessageLog,
    pub conversations: ConversationIndex,
    pub live: LiveRouter,
    pub profiles: Profiles,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, identity: Arc<dyn IdentityProvider>, config: &Config) -> Self {
        Self {
            identity,
            reciprocity: ReciprocityDetector::new(SwipeLedger::new(db_pool.clone())),
            events: Events::new(db_pool.clone()),
            roster: Roster::new(db_pool.clone(), config.roster()),
            log: MessageLog::new(db_pool.clone(), config.max_message_len),
            conversations: ConversationIndex::new(db_pool.clone()),
            live: LiveRouter::new(config.live_channel_capacity),
            profiles: Profiles::new(db_pool.clone()),
            db_pool,
        }
    }
}

/// Full HTTP surface with session, tracing and CORS layers.
pub fn app(state: AppState, session_idle: time::Duration) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(session_idle));

    Router::new()
        .route("/health", get(health))
        .nest("/session", identity::router())
        .nest("/swipes", swipes::router())
        .nest("/events", events::router())
        .nest("/chats", chat::router())
        .nest("/profile", profiles::router())
        .with_state(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health(State(db_pool): State<SqlitePool>) -> AppResult<&'static str> {
    sqlx::query("SELECT 1").execute(&db_pool).await?;
    Ok("ok")
}

/// Wire shape of every error leaving the service, over HTTP or the socket.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub reason: String,
    pub message: String,
}

impl From<&CoreError> for ErrorBody {
    fn from(err: &CoreError) -> Self {
        Self {
            reason: err.reason().to_owned(),
            message: err.to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn core(&self) -> Option<&CoreError> {
        self.0.downcast_ref()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = self.core() {
            if err.status().is_server_error() {
                tracing::error!(error = %err, "request failed");
            }
            return (err.status(), Json(ErrorBody::from(err))).into_response();
        }

        tracing::error!(error = ?self.0, "unhandled error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                reason: "internal".to_owned(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(CoreError);
apperr_impl!(serde_json::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::from(err).into()
    }
}
