#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sportmatch::{
    config::Config,
    db,
    events::{store::NewEvent, Level, Location},
    identity::IdentityProvider,
    AppState, CoreError, CoreResult, UserId,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// A fresh on-disk database; the directory lives as long as the value.
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let pool = db::connect(&url, 8).await.expect("open database");
    db::migrate(&pool).await.expect("schema");
    TestDb { pool, _dir: dir }
}

/// Accepts tokens of the form `tok-<user id>`.
pub struct StaticIdentity;

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn resolve(&self, token: &str) -> CoreResult<UserId> {
        token
            .strip_prefix("tok-")
            .and_then(|id| UserId::parse(id).ok())
            .ok_or_else(|| CoreError::unauthenticated("unknown token"))
    }
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "IDENTITY_API_KEY" => Some("test".to_owned()),
        _ => None,
    })
    .expect("config")
}

pub fn test_state(pool: SqlitePool) -> AppState {
    AppState::new(pool, Arc::new(StaticIdentity), &test_config())
}

pub fn user(id: &str) -> UserId {
    UserId::from(id)
}

pub fn hours_from_now(hours: i64) -> DateTime<Utc> {
    Utc::now() + Duration::hours(hours)
}

pub fn new_event(sport: &str, capacity: u32, start_time: DateTime<Utc>) -> NewEvent {
    NewEvent {
        sport: sport.to_owned(),
        level: Level::AllLevels,
        capacity,
        start_time,
        location: Location {
            name: "Riverside courts".to_owned(),
            address: Some("1 River Rd".to_owned()),
            coordinates: Some([13.4, 52.5]),
        },
        fee: 0.0,
        description: None,
    }
}
