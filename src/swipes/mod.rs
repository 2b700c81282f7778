pub mod ledger;
pub mod reciprocity;
mod swipe;

use std::{fmt, str::FromStr};

use axum::{routing::{get, post}, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, CoreError, UserId};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(swipe::swipe))
        .route("/connections", get(swipe::connections))
        .route("/connections/{user_id}", get(swipe::connection))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[serde(alias = "right")]
    Like,
    #[serde(alias = "left")]
    Pass,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Like => "like",
            Direction::Pass => "pass",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Direction::Like),
            "pass" => Ok(Direction::Pass),
            other => Err(CoreError::Corrupt(format!("unknown swipe direction {other:?}"))),
        }
    }
}

/// One directional swipe. Immutable once written; a later swipe on the same
/// target replaces it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwipeRecord {
    pub id: Uuid,
    pub swiper_id: UserId,
    pub swiped_id: UserId,
    pub direction: Direction,
    pub created_at: DateTime<Utc>,
}
