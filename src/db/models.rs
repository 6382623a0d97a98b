//! Shared data models re-exported for database layer consumers.

pub use crate::api::{
    Driver, DriverId, Load, LoadId, RestPeriod, RestPeriodId, RestStatus, RestType, Schedule,
    ScheduleId, ScheduleStatus,
};
pub use crate::models::TimeWindow;

/// Row counts of the backing store, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RepositoryCounts {
    pub schedules: usize,
    pub rest_periods: usize,
    pub drivers: usize,
    pub loads: usize,
}
