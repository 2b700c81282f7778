mod join;
mod list;
mod new;
pub mod roster;
pub mod store;

use std::{fmt, str::FromStr};

use axum::{routing::{get, post}, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{db, AppState, CoreError, UserId};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list::list_events).post(new::new_event))
        .route("/{id}", get(list::event))
        .route("/{id}/join", post(join::join_event))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
    #[serde(rename = "All Levels")]
    AllLevels,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Beginner => "Beginner",
            Level::Intermediate => "Intermediate",
            Level::Advanced => "Advanced",
            Level::AllLevels => "All Levels",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Beginner" => Ok(Level::Beginner),
            "Intermediate" => Ok(Level::Intermediate),
            "Advanced" => Ok(Level::Advanced),
            "All Levels" => Ok(Level::AllLevels),
            other => Err(CoreError::validation("level", format!("unknown level {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// `[longitude, latitude]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Upcoming,
    Started,
}

/// A scheduled activity. `participants` holds unique ids, creator first, and
/// never grows past `capacity`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub creator_id: UserId,
    pub sport: String,
    pub level: Level,
    pub location: Location,
    pub description: Option<String>,
    pub fee: f64,
    pub capacity: u32,
    pub participants: Vec<UserId>,
    pub version: i64,
    pub start_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn participant_count(&self) -> u32 {
        self.participants.len() as u32
    }

    pub fn is_full(&self) -> bool {
        self.participant_count() >= self.capacity
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> EventStatus {
        if self.start_time <= now {
            EventStatus::Started
        } else {
            EventStatus::Upcoming
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct EventRow {
    id: String,
    creator_id: UserId,
    sport: String,
    level: String,
    location: String,
    description: Option<String>,
    fee: f64,
    capacity: i64,
    participant_count: i64,
    participants: String,
    version: i64,
    start_time: i64,
    created_at: i64,
    updated_at: i64,
}

pub(crate) const EVENT_COLUMNS: &str = "id,creator_id,sport,level,location,description,fee,capacity,participant_count,participants,version,start_time,created_at,updated_at";

impl TryFrom<EventRow> for Event {
    type Error = CoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let participants: Vec<UserId> = serde_json::from_str(&row.participants)?;
        if participants.len() as i64 != row.participant_count {
            return Err(CoreError::Corrupt(format!(
                "event {} counts {} participants but lists {}",
                row.id,
                row.participant_count,
                participants.len()
            )));
        }

        Ok(Event {
            id: Uuid::parse_str(&row.id)?,
            creator_id: row.creator_id,
            sport: row.sport,
            level: row.level.parse().map_err(|_| CoreError::Corrupt(format!("unknown level {:?}", row.level)))?,
            location: serde_json::from_str(&row.location)?,
            description: row.description,
            fee: row.fee,
            capacity: u32::try_from(row.capacity).map_err(|_| CoreError::Corrupt(format!("capacity {}", row.capacity)))?,
            participants,
            version: row.version,
            start_time: db::from_micros(row.start_time),
            created_at: db::from_micros(row.created_at),
            updated_at: db::from_micros(row.updated_at),
        })
    }
}

/// Event as returned to clients, with derived fields.
#[derive(Debug, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub participant_count: u32,
    pub status: EventStatus,
}

impl From<Event> for EventView {
    fn from(event: Event) -> Self {
        EventView {
            participant_count: event.participant_count(),
            status: event.status_at(Utc::now()),
            event,
        }
    }
}
