//! Engine error taxonomy.
//!
//! Every validation failure is a distinct, user-actionable reason: the
//! dispatch caller must be able to explain *why* a schedule was rejected.
//! None of these conditions is fatal; a rejection is an ordinary negative
//! result, and the caller responds by supplying a different time window or
//! driver. Persistence-layer failures pass through unmodified in the
//! [`ScheduleError::Repository`] variant.

use crate::api::{DriverId, LoadId, ScheduleId};
use crate::db::repository::RepositoryError;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

/// Result type for engine operations.
pub type ScheduleResult<T> = std::result::Result<T, ScheduleError>;

/// Rejection reasons surfaced by the scheduling engine.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The requested window is empty or inverted.
    #[error("invalid interval: start {start} is not before end {end}")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// The driver already has a non-cancelled schedule intersecting the
    /// requested window.
    #[error("driver {driver} already has a schedule overlapping the requested window")]
    Overlap {
        driver: DriverId,
        conflicting: Option<ScheduleId>,
    },

    /// Accepting the window would push the day's clipped driving total over
    /// the daily cap.
    #[error("daily driving limit exceeded on {day}: {driven_minutes} min against a cap of {cap_minutes} min")]
    DailyLimitExceeded {
        day: NaiveDate,
        driven_minutes: i64,
        cap_minutes: i64,
    },

    /// Rest-period requirements are not met for the requested window.
    #[error("rest requirement violated: {0}")]
    RestViolation(String),

    /// The window would extend a continuous driving span past the limit.
    #[error("continuous driving limit violated: {0}")]
    ContinuousDrivingViolation(String),

    /// Deletion refused: the schedule carries a load that is still active.
    #[error("schedule {schedule} carries active load {load} and cannot be deleted")]
    ActiveLoadConflict { schedule: ScheduleId, load: LoadId },

    /// Unknown driver, schedule, or rest period.
    #[error("{0} not found")]
    NotFound(String),

    /// The requested status change is not permitted by the state machine.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    /// Persistence failure, propagated as-is.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ScheduleError {
    /// Map a repository lookup failure: `NotFound` becomes the engine's own
    /// not-found reason (it is locally detectable), everything else passes
    /// through.
    pub(crate) fn from_lookup(err: RepositoryError, what: impl std::fmt::Display) -> Self {
        match err {
            RepositoryError::NotFound { .. } => ScheduleError::NotFound(what.to_string()),
            other => ScheduleError::Repository(other),
        }
    }
}
