use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::UserId;

pub type CoreResult<T> = Result<T, CoreError>;

/// Failures of the core operations. Every variant is recoverable by the caller.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("cannot swipe on yourself")]
    SelfSwipe,

    #[error("event {id} not found")]
    EventNotFound { id: Uuid },

    #[error("event {id} is full ({capacity} participants)")]
    EventFull { id: Uuid, capacity: u32 },

    #[error("event {id} has already started")]
    EventStarted { id: Uuid },

    #[error("{user} already participates in event {id}")]
    DuplicateParticipant { id: Uuid, user: UserId },

    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("could not commit enrollment into event {id} after {attempts} attempts")]
    ConflictRetryExhausted { id: Uuid, attempts: u32 },

    #[error("authentication failed: {0}")]
    Unauthenticated(String),

    #[error("storage error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("malformed stored record: {0}")]
    Corrupt(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

impl From<uuid::Error> for CoreError {
    fn from(err: uuid::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

impl CoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self::Unauthenticated(reason.into())
    }

    /// Stable machine-readable code, part of the public API.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::SelfSwipe => "self_swipe",
            Self::EventNotFound { .. } => "event_not_found",
            Self::EventFull { .. } => "event_full",
            Self::EventStarted { .. } => "event_started",
            Self::DuplicateParticipant { .. } => "duplicate_participant",
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::ConflictRetryExhausted { .. } => "conflict_retry_exhausted",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Store(_) | Self::Corrupt(_) => "storage",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::SelfSwipe | Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::EventNotFound { .. } | Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::EventFull { .. }
            | Self::EventStarted { .. }
            | Self::DuplicateParticipant { .. }
            | Self::ConflictRetryExhausted { .. } => StatusCode::CONFLICT,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Store(_) | Self::Corrupt(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_are_distinct_per_domain_error() {
        let id = Uuid::now_v7();
        let errors = [
            CoreError::SelfSwipe,
            CoreError::EventNotFound { id },
            CoreError::EventFull { id, capacity: 2 },
            CoreError::EventStarted { id },
            CoreError::DuplicateParticipant {
                id,
                user: UserId::from("u1"),
            },
            CoreError::validation("text", "empty"),
            CoreError::not_found("message"),
            CoreError::ConflictRetryExhausted { id, attempts: 8 },
            CoreError::unauthenticated("missing token"),
        ];

        let mut reasons: Vec<_> = errors.iter().map(CoreError::reason).collect();
        reasons.sort();
        reasons.dedup();
        assert_eq!(reasons.len(), errors.len());
    }

    #[test]
    fn capacity_errors_are_conflicts() {
        let id = Uuid::now_v7();
        assert_eq!(
            CoreError::EventFull { id, capacity: 1 }.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(CoreError::SelfSwipe.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            CoreError::EventNotFound { id }.status(),
            StatusCode::NOT_FOUND
        );
    }
}
