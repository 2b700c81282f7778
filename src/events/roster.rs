use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::SqlitePool;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{db, CoreError, CoreResult, UserId};

use super::{store, Event, EventRow, EVENT_COLUMNS};

#[derive(Debug, Clone)]
pub struct RosterConfig {
    /// Total update attempts before giving up.
    pub max_attempts: u32,
    /// Upper bound of the random pause between attempts.
    pub backoff: Duration,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            backoff: Duration::from_millis(5),
        }
    }
}

/// Capacity-safe enrollment into events.
///
/// A join is one conditional `UPDATE` that appends the user and bumps the
/// count only while the user is absent, the event has not started and a slot
/// is free. SQLite serializes writers, so concurrent joins never see a stale
/// count and no join loses to another while slots remain. When the update
/// matches nothing the row is read once to report why. Those conditions only
/// ever move one way, so the read always finds the reason; the bounded retry
/// covers a row that changed shape underneath.
#[derive(Clone)]
pub struct Roster {
    db_pool: SqlitePool,
    config: RosterConfig,
}

impl Roster {
    pub fn new(db_pool: SqlitePool, config: RosterConfig) -> Self {
        Self { db_pool, config }
    }

    pub async fn try_enroll(&self, event_id: Uuid, user_id: &UserId) -> CoreResult<Event> {
        self.try_enroll_at(event_id, user_id, Utc::now()).await
    }

    /// Same as [`Roster::try_enroll`] with an explicit clock for the start check.
    #[instrument(skip_all, fields(%event_id, user = %user_id))]
    pub async fn try_enroll_at(
        &self,
        event_id: Uuid,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> CoreResult<Event> {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let enrolled: Option<EventRow> = sqlx::query_as(&format!(
                "UPDATE events SET
                    participants = json_insert(participants, '$[#]', ?1),
                    participant_count = participant_count + 1,
                    version = version + 1,
                    updated_at = ?2
                 WHERE id = ?3
                    AND participant_count < capacity
                    AND start_time > ?4
                    AND NOT EXISTS (SELECT 1 FROM json_each(events.participants) WHERE json_each.value = ?1)
                 RETURNING {EVENT_COLUMNS}"
            ))
            .bind(user_id)
            .bind(db::to_micros(db::now()))
            .bind(event_id.to_string())
            .bind(db::to_micros(now))
            .fetch_optional(&self.db_pool)
            .await?;

            if let Some(row) = enrolled {
                let event = Event::try_from(row)?;
                info!(attempt, count = event.participant_count(), capacity = event.capacity, "enrolled");
                return Ok(event);
            }

            let event = store::load(&self.db_pool, event_id)
                .await?
                .ok_or(CoreError::EventNotFound { id: event_id })?;
            rejection(&event, user_id, now)?;

            debug!(attempt, "join matched no row with a free slot");
            if attempt < max_attempts {
                self.pause().await;
            }
        }

        warn!(attempts = max_attempts, "enrollment gave up");
        Err(CoreError::ConflictRetryExhausted {
            id: event_id,
            attempts: max_attempts,
        })
    }

    async fn pause(&self) {
        let max = self.config.backoff.as_micros() as u64;
        if max == 0 {
            tokio::task::yield_now().await;
            return;
        }
        let pause = Duration::from_micros(rand::rng().random_range(0..=max));
        tokio::time::sleep(pause).await;
    }
}

/// Why `user_id` cannot join `event` at `now`, checked in reporting order.
fn rejection(event: &Event, user_id: &UserId, now: DateTime<Utc>) -> CoreResult<()> {
    if event.participants.contains(user_id) {
        return Err(CoreError::DuplicateParticipant {
            id: event.id,
            user: user_id.clone(),
        });
    }
    if event.start_time <= now {
        return Err(CoreError::EventStarted { id: event.id });
    }
    if event.is_full() {
        return Err(CoreError::EventFull {
            id: event.id,
            capacity: event.capacity,
        });
    }
    Ok(())
}
