mod page;

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::{db, events::Level, AppState, CoreError, CoreResult, UserId};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(page::own_profile).put(page::update_profile))
        .route("/{user_id}", get(page::profile))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookingFor {
    Men,
    Women,
    #[serde(alias = "Any")]
    Everyone,
}

impl LookingFor {
    fn as_str(&self) -> &'static str {
        match self {
            LookingFor::Men => "Men",
            LookingFor::Women => "Women",
            LookingFor::Everyone => "Everyone",
        }
    }

    fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "Men" => Ok(LookingFor::Men),
            "Women" => Ok(LookingFor::Women),
            "Everyone" => Ok(LookingFor::Everyone),
            other => Err(CoreError::Corrupt(format!("unknown preference {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub user_id: UserId,
    pub name: String,
    pub sports: Vec<String>,
    pub skill_level: Level,
    pub looking_for_gender: LookingFor,
    pub age_range: AgeRange,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    fn blank(user_id: UserId) -> Self {
        Profile {
            user_id,
            name: String::new(),
            sports: Vec::new(),
            skill_level: Level::AllLevels,
            looking_for_gender: LookingFor::Everyone,
            age_range: AgeRange { min: 18, max: 99 },
            updated_at: None,
        }
    }
}

/// The only profile fields a user may change. Anything else in the payload
/// is rejected.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub sports: Option<Vec<String>>,
    pub skill_level: Option<Level>,
    pub looking_for_gender: Option<LookingFor>,
    pub age_range: Option<AgeRange>,
}

impl ProfilePatch {
    const MAX_NAME: usize = 100;
    const MAX_SPORTS: usize = 20;

    fn validate(&self) -> CoreResult<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() || name.chars().count() > Self::MAX_NAME {
                return Err(CoreError::validation(
                    "name",
                    format!("must be 1 to {} characters", Self::MAX_NAME),
                ));
            }
        }
        if let Some(sports) = &self.sports {
            if sports.len() > Self::MAX_SPORTS {
                return Err(CoreError::validation(
                    "sports",
                    format!("at most {} entries", Self::MAX_SPORTS),
                ));
            }
            if sports.iter().any(|sport| sport.trim().is_empty()) {
                return Err(CoreError::validation("sports", "entries must not be empty"));
            }
        }
        if let Some(AgeRange { min, max }) = self.age_range {
            if min < 18 || min > max {
                return Err(CoreError::validation(
                    "age_range",
                    "min must be at least 18 and not above max",
                ));
            }
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: UserId,
    name: String,
    sports: String,
    skill_level: String,
    looking_for_gender: String,
    age_min: i64,
    age_max: i64,
    updated_at: i64,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = CoreError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let age = |v: i64| u8::try_from(v).map_err(|_| CoreError::Corrupt(format!("age {v}")));
        Ok(Profile {
            user_id: row.user_id,
            name: row.name,
            sports: serde_json::from_str(&row.sports)?,
            skill_level: row
                .skill_level
                .parse()
                .map_err(|_| CoreError::Corrupt(format!("unknown level {:?}", row.skill_level)))?,
            looking_for_gender: LookingFor::parse(&row.looking_for_gender)?,
            age_range: AgeRange {
                min: age(row.age_min)?,
                max: age(row.age_max)?,
            },
            updated_at: Some(db::from_micros(row.updated_at)),
        })
    }
}

#[derive(Clone)]
pub struct Profiles {
    db_pool: SqlitePool,
}

impl Profiles {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Never-edited profiles read as defaults.
    pub async fn get(&self, user_id: &UserId) -> CoreResult<Profile> {
        let row: Option<ProfileRow> = sqlx::query_as(
            "SELECT user_id,name,sports,skill_level,looking_for_gender,age_min,age_max,updated_at
             FROM profiles WHERE user_id=?",
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => Ok(Profile::blank(user_id.clone())),
        }
    }

    /// Applies the fields present in `patch` in one statement; absent fields
    /// keep their stored value.
    #[instrument(skip_all, fields(user = %user_id))]
    pub async fn update(&self, user_id: &UserId, patch: ProfilePatch) -> CoreResult<Profile> {
        patch.validate()?;

        let sports = patch.sports.as_ref().map(serde_json::to_string).transpose()?;
        sqlx::query(
            "INSERT INTO profiles (user_id,name,sports,skill_level,looking_for_gender,age_min,age_max,updated_at)
             VALUES (?1, COALESCE(?2, ''), COALESCE(?3, '[]'), COALESCE(?4, 'All Levels'), COALESCE(?5, 'Everyone'),
                     COALESCE(?6, 18), COALESCE(?7, 99), ?8)
             ON CONFLICT (user_id) DO UPDATE SET
                name = COALESCE(?2, profiles.name),
                sports = COALESCE(?3, profiles.sports),
                skill_level = COALESCE(?4, profiles.skill_level),
                looking_for_gender = COALESCE(?5, profiles.looking_for_gender),
                age_min = COALESCE(?6, profiles.age_min),
                age_max = COALESCE(?7, profiles.age_max),
                updated_at = ?8",
        )
        .bind(user_id)
        .bind(patch.name.as_deref().map(str::trim))
        .bind(sports)
        .bind(patch.skill_level.map(|level| level.as_str()))
        .bind(patch.looking_for_gender.map(|l| l.as_str()))
        .bind(patch.age_range.map(|range| i64::from(range.min)))
        .bind(patch.age_range.map(|range| i64::from(range.max)))
        .bind(db::to_micros(db::now()))
        .execute(&self.db_pool)
        .await?;

        info!("profile updated");
        self.get(user_id).await
    }
}
