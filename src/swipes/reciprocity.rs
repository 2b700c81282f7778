use serde::Serialize;
use tracing::{info, instrument};

use crate::{CoreResult, UserId};

use super::{ledger::SwipeLedger, Direction, SwipeRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionResult {
    pub is_connection: bool,
}

/// Decides whether a swipe completes a mutual like.
///
/// Every check reads the counterpart's swipe strictly after the caller's own
/// swipe has been committed. Two users liking each other at the same instant
/// are serialized by the store: whichever write lands second sees the first,
/// so at least one of the two calls reports the connection. The check reads
/// only current state, so repeating it later always gives the same answer.
#[derive(Clone)]
pub struct ReciprocityDetector {
    ledger: SwipeLedger,
}

impl ReciprocityDetector {
    pub fn new(ledger: SwipeLedger) -> Self {
        Self { ledger }
    }

    /// Records a swipe and checks it for reciprocity in one call.
    pub async fn swipe(
        &self,
        swiper_id: &UserId,
        swiped_id: &UserId,
        direction: Direction,
    ) -> CoreResult<(SwipeRecord, ConnectionResult)> {
        let record = self.ledger.record(swiper_id, swiped_id, direction).await?;
        let result = self.check_connection(&record).await?;
        Ok((record, result))
    }

    /// `record` must already be persisted.
    #[instrument(skip_all, fields(swiper = %record.swiper_id, swiped = %record.swiped_id))]
    pub async fn check_connection(&self, record: &SwipeRecord) -> CoreResult<ConnectionResult> {
        if record.direction != Direction::Like {
            return Ok(ConnectionResult { is_connection: false });
        }

        let is_connection = self
            .ledger
            .find_reciprocal(&record.swiper_id, &record.swiped_id)
            .await?
            .is_some();
        if is_connection {
            info!("connection detected");
        }

        Ok(ConnectionResult { is_connection })
    }

    /// Reconciliation view: are `a` and `b` connected right now, regardless
    /// of which swipe reported it?
    pub async fn check_pair(&self, a: &UserId, b: &UserId) -> CoreResult<ConnectionResult> {
        let liked = self
            .ledger
            .find(a, b)
            .await?
            .is_some_and(|record| record.direction == Direction::Like);
        let is_connection = liked && self.ledger.find_reciprocal(a, b).await?.is_some();
        Ok(ConnectionResult { is_connection })
    }

    pub async fn connections_of(&self, user_id: &UserId) -> CoreResult<Vec<UserId>> {
        self.ledger.mutual_likes(user_id).await
    }
}
