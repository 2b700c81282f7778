use std::{str::FromStr, time::Duration};

use anyhow::{anyhow, Context};

use crate::events::roster::RosterConfig;

pub const DEFAULT_LOOKUP_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:lookup";

/// Process configuration, read from the environment (a `.env` file is honoured).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: String,
    pub identity_api_key: String,
    pub identity_lookup_url: String,
    pub enroll_max_attempts: u32,
    pub enroll_backoff: Duration,
    pub live_channel_capacity: usize,
    pub max_message_len: usize,
    pub session_idle_minutes: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let enroll_max_attempts: u32 = parsed(&lookup, "ENROLL_MAX_ATTEMPTS", 8)?;
        if enroll_max_attempts == 0 {
            return Err(anyhow!("ENROLL_MAX_ATTEMPTS must be at least 1"));
        }

        Ok(Config {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://sportmatch.db".to_owned()),
            db_max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", 16)?,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_owned()),
            identity_api_key: lookup("IDENTITY_API_KEY").context("IDENTITY_API_KEY is not set")?,
            identity_lookup_url: lookup("IDENTITY_LOOKUP_URL").unwrap_or_else(|| DEFAULT_LOOKUP_URL.to_owned()),
            enroll_max_attempts,
            enroll_backoff: Duration::from_millis(parsed(&lookup, "ENROLL_BACKOFF_MS", 5)?),
            live_channel_capacity: parsed(&lookup, "LIVE_CHANNEL_CAPACITY", 64)?,
            max_message_len: parsed(&lookup, "MAX_MESSAGE_LEN", 2000)?,
            session_idle_minutes: parsed(&lookup, "SESSION_IDLE_MINUTES", 60)?,
        })
    }

    pub fn roster(&self) -> RosterConfig {
        RosterConfig {
            max_attempts: self.enroll_max_attempts,
            backoff: self.enroll_backoff,
        }
    }

    pub fn session_idle(&self) -> time::Duration {
        time::Duration::minutes(self.session_idle_minutes)
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value {raw:?}")),
        None => Ok(default),
    }
}
