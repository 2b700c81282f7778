use std::{str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

const SCHEMA: &[&str] = &[
    // unique: id
    // unique: swiper_id, swiped_id (one authoritative swipe per ordered pair)
    "CREATE TABLE IF NOT EXISTS swipes (
        id TEXT PRIMARY KEY,
        swiper_id TEXT NOT NULL,
        swiped_id TEXT NOT NULL,
        direction TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE (swiper_id, swiped_id)
    )",
    "CREATE INDEX IF NOT EXISTS swipes_by_target ON swipes (swiped_id, direction)",
    // participants is a JSON array kept next to its count; both change in one
    // statement guarded by version
    "CREATE TABLE IF NOT EXISTS events (
        id TEXT PRIMARY KEY,
        creator_id TEXT NOT NULL,
        sport TEXT NOT NULL,
        level TEXT NOT NULL,
        location TEXT NOT NULL,
        description TEXT,
        fee REAL NOT NULL DEFAULT 0,
        capacity INTEGER NOT NULL CHECK (capacity >= 1),
        participant_count INTEGER NOT NULL CHECK (participant_count <= capacity),
        participants TEXT NOT NULL,
        version INTEGER NOT NULL DEFAULT 0,
        start_time INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS events_by_start ON events (start_time)",
    "CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        sender_id TEXT NOT NULL,
        receiver_id TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        read INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS messages_unread ON messages (receiver_id, sender_id, read)",
    "CREATE INDEX IF NOT EXISTS messages_by_sender ON messages (sender_id, created_at)",
    "CREATE INDEX IF NOT EXISTS messages_by_receiver ON messages (receiver_id, created_at)",
    // one row per (owner, counterpart), maintained on every append
    "CREATE TABLE IF NOT EXISTS conversations (
        owner_id TEXT NOT NULL,
        counterpart_id TEXT NOT NULL,
        last_message_id TEXT NOT NULL,
        last_message TEXT NOT NULL,
        last_message_at INTEGER NOT NULL,
        unread_count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (owner_id, counterpart_id)
    )",
    "CREATE INDEX IF NOT EXISTS conversations_recent ON conversations (owner_id, last_message_at)",
    "CREATE TABLE IF NOT EXISTS profiles (
        user_id TEXT PRIMARY KEY,
        name TEXT NOT NULL DEFAULT '',
        sports TEXT NOT NULL DEFAULT '[]',
        skill_level TEXT NOT NULL DEFAULT 'All Levels',
        looking_for_gender TEXT NOT NULL DEFAULT 'Everyone',
        age_min INTEGER NOT NULL DEFAULT 18,
        age_max INTEGER NOT NULL DEFAULT 99,
        updated_at INTEGER NOT NULL
    )",
];

pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10));

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(db_pool).await?;
    }
    Ok(())
}

/// Timestamps are stored as microseconds since the epoch so that range scans
/// sort numerically.
pub(crate) fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

/// Current time at storage precision, so a returned record equals its stored copy.
pub(crate) fn now() -> DateTime<Utc> {
    from_micros(to_micros(Utc::now()))
}
