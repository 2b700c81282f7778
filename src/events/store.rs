use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{db, CoreError, CoreResult, UserId};

use super::{Event, EventRow, Level, Location, EVENT_COLUMNS};

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub sport: String,
    pub level: Level,
    pub capacity: u32,
    pub start_time: DateTime<Utc>,
    pub location: Location,
    #[serde(default)]
    pub fee: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewEvent {
    fn validate(&self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.sport.trim().is_empty() {
            return Err(CoreError::validation("sport", "must not be empty"));
        }
        if self.capacity < 1 {
            return Err(CoreError::validation("capacity", "must be at least 1"));
        }
        if self.start_time <= now {
            return Err(CoreError::validation("start_time", "must be in the future"));
        }
        if self.location.name.trim().is_empty() {
            return Err(CoreError::validation("location", "name must not be empty"));
        }
        if !self.fee.is_finite() || self.fee < 0.0 {
            return Err(CoreError::validation("fee", "must be a non-negative amount"));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct EventFilter {
    pub sport: Option<String>,
    pub level: Option<Level>,
}

/// Creation and lookup of events. Enrollment lives in [`super::roster::Roster`].
#[derive(Clone)]
pub struct Events {
    db_pool: SqlitePool,
}

impl Events {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    #[instrument(skip_all, fields(creator = %creator_id, sport = %new_event.sport))]
    pub async fn create(&self, creator_id: &UserId, new_event: NewEvent) -> CoreResult<Event> {
        let now = db::now();
        new_event.validate(now)?;

        let event = Event {
            id: Uuid::now_v7(),
            creator_id: creator_id.clone(),
            sport: new_event.sport.trim().to_owned(),
            level: new_event.level,
            location: new_event.location,
            description: new_event.description,
            fee: new_event.fee,
            capacity: new_event.capacity,
            participants: vec![creator_id.clone()],
            version: 0,
            start_time: new_event.start_time,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(&format!("INSERT INTO events ({EVENT_COLUMNS}) values (?,?,?,?,?,?,?,?,?,?,?,?,?,?)"))
            .bind(event.id.to_string())
            .bind(&event.creator_id)
            .bind(&event.sport)
            .bind(event.level.as_str())
            .bind(serde_json::to_string(&event.location)?)
            .bind(&event.description)
            .bind(event.fee)
            .bind(i64::from(event.capacity))
            .bind(i64::from(event.participant_count()))
            .bind(serde_json::to_string(&event.participants)?)
            .bind(event.version)
            .bind(db::to_micros(event.start_time))
            .bind(db::to_micros(event.created_at))
            .bind(db::to_micros(event.updated_at))
            .execute(&self.db_pool)
            .await?;

        info!(event_id = %event.id, "event created");
        Ok(event)
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Event> {
        load(&self.db_pool, id)
            .await?
            .ok_or(CoreError::EventNotFound { id })
    }

    /// Events that have not started yet, soonest first.
    pub async fn list_upcoming(&self, filter: &EventFilter) -> CoreResult<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE start_time > ?1 AND (?2 IS NULL OR sport = ?2) AND (?3 IS NULL OR level = ?3)
             ORDER BY start_time ASC"
        ))
        .bind(db::to_micros(Utc::now()))
        .bind(filter.sport.as_deref())
        .bind(filter.level.map(|level| level.as_str()))
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(Event::try_from).collect()
    }
}

pub(crate) async fn load(db_pool: &SqlitePool, id: Uuid) -> CoreResult<Option<Event>> {
    sqlx::query_as::<_, EventRow>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id=?"))
        .bind(id.to_string())
        .fetch_optional(db_pool)
        .await?
        .map(Event::try_from)
        .transpose()
}
