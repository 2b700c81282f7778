use sqlx::SqlitePool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{db, CoreError, CoreResult, UserId};

use super::{Direction, SwipeRecord};

/// Swipe storage, keyed by ordered (swiper, swiped) pair.
#[derive(Clone)]
pub struct SwipeLedger {
    db_pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SwipeRow {
    id: String,
    swiper_id: UserId,
    swiped_id: UserId,
    direction: String,
    created_at: i64,
}

impl TryFrom<SwipeRow> for SwipeRecord {
    type Error = CoreError;

    fn try_from(row: SwipeRow) -> Result<Self, Self::Error> {
        Ok(SwipeRecord {
            id: Uuid::parse_str(&row.id)?,
            swiper_id: row.swiper_id,
            swiped_id: row.swiped_id,
            direction: row.direction.parse()?,
            created_at: db::from_micros(row.created_at),
        })
    }
}

impl SwipeLedger {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Stores the swipe and returns once it is committed, so any read issued
    /// afterwards observes it. Re-swiping the same target upserts.
    #[instrument(skip_all, fields(swiper = %swiper_id, swiped = %swiped_id, %direction))]
    pub async fn record(
        &self,
        swiper_id: &UserId,
        swiped_id: &UserId,
        direction: Direction,
    ) -> CoreResult<SwipeRecord> {
        if swiper_id == swiped_id {
            return Err(CoreError::SelfSwipe);
        }

        let record = SwipeRecord {
            id: Uuid::now_v7(),
            swiper_id: swiper_id.clone(),
            swiped_id: swiped_id.clone(),
            direction,
            created_at: db::now(),
        };

        sqlx::query(
            "INSERT INTO swipes (id,swiper_id,swiped_id,direction,created_at) VALUES (?,?,?,?,?)
             ON CONFLICT (swiper_id, swiped_id) DO UPDATE SET
                id = excluded.id,
                direction = excluded.direction,
                created_at = excluded.created_at",
        )
        .bind(record.id.to_string())
        .bind(&record.swiper_id)
        .bind(&record.swiped_id)
        .bind(direction.as_str())
        .bind(db::to_micros(record.created_at))
        .execute(&self.db_pool)
        .await?;

        debug!(id = %record.id, "swipe recorded");
        Ok(record)
    }

    /// Current swipe of `swiper_id` on `swiped_id`, if any.
    pub async fn find(&self, swiper_id: &UserId, swiped_id: &UserId) -> CoreResult<Option<SwipeRecord>> {
        sqlx::query_as::<_, SwipeRow>(
            "SELECT id,swiper_id,swiped_id,direction,created_at FROM swipes WHERE swiper_id=? AND swiped_id=?",
        )
        .bind(swiper_id)
        .bind(swiped_id)
        .fetch_optional(&self.db_pool)
        .await?
        .map(SwipeRecord::try_from)
        .transpose()
    }

    /// The `like` that `swiped_id` gave back to `swiper_id`, if any.
    pub async fn find_reciprocal(
        &self,
        swiper_id: &UserId,
        swiped_id: &UserId,
    ) -> CoreResult<Option<SwipeRecord>> {
        Ok(self
            .find(swiped_id, swiper_id)
            .await?
            .filter(|record| record.direction == Direction::Like))
    }

    /// Users that `user_id` liked and who liked `user_id` back.
    pub async fn mutual_likes(&self, user_id: &UserId) -> CoreResult<Vec<UserId>> {
        let rows: Vec<(UserId,)> = sqlx::query_as(
            "SELECT mine.swiped_id FROM swipes mine
             JOIN swipes theirs ON theirs.swiper_id = mine.swiped_id AND theirs.swiped_id = mine.swiper_id
             WHERE mine.swiper_id = ? AND mine.direction = 'like' AND theirs.direction = 'like'
             ORDER BY MAX(mine.created_at, theirs.created_at) DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
