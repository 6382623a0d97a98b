//! Repository trait definitions.
//!
//! The abstract interface the engine requires from its persistence
//! collaborator: schedules and rest periods filtered by driver and time
//! range, plus the narrow driver/load read surface. [`FleetRepository`]
//! bundles the family into the unit the service layer consumes as
//! `Arc<dyn FleetRepository>`.
//!
//! All lookups are bounded by driver id and time range; implementations are
//! expected to return schedules and rest periods ordered by window start.

pub mod error;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

use crate::api::{
    Driver, DriverId, Load, LoadId, RestPeriod, RestPeriodId, RestStatus, RestType, Schedule,
    ScheduleId, ScheduleStatus, TimeWindow,
};
use async_trait::async_trait;

/// Schedule persistence operations.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Persist a new schedule, assigning its id. Returns the committed
    /// record.
    async fn create_schedule(&self, schedule: &Schedule) -> RepositoryResult<Schedule>;

    /// Fetch a schedule by id.
    async fn get_schedule(&self, id: ScheduleId) -> RepositoryResult<Schedule>;

    /// Replace a stored schedule. The schedule must carry its id.
    async fn update_schedule(&self, schedule: &Schedule) -> RepositoryResult<()>;

    /// Physically remove a schedule.
    ///
    /// The scheduler never calls this for ordinary deletion (cancellation
    /// preserves audit history); the recurrence path uses it for load-free
    /// instances.
    async fn delete_schedule(&self, id: ScheduleId) -> RepositoryResult<()>;

    /// Schedules for a driver, optionally restricted to those overlapping
    /// `range` (half-open) and to the given statuses. Ordered by window
    /// start.
    async fn schedules_for_driver(
        &self,
        driver: DriverId,
        range: Option<TimeWindow>,
        statuses: Option<&[ScheduleStatus]>,
    ) -> RepositoryResult<Vec<Schedule>>;

    /// Instances of a recurring series, ordered by instance number.
    async fn instances_of(&self, parent: ScheduleId) -> RepositoryResult<Vec<Schedule>>;
}

/// Rest-period persistence operations.
#[async_trait]
pub trait RestPeriodRepository: Send + Sync {
    /// Persist a new rest period, assigning its id.
    async fn create_rest_period(&self, rest: &RestPeriod) -> RepositoryResult<RestPeriod>;

    /// Fetch a rest period by id.
    async fn get_rest_period(&self, id: RestPeriodId) -> RepositoryResult<RestPeriod>;

    /// Replace a stored rest period. The record must carry its id.
    async fn update_rest_period(&self, rest: &RestPeriod) -> RepositoryResult<()>;

    /// Rest periods for a driver, optionally restricted by overlapping time
    /// range, status, and type. Ordered by window start.
    async fn rest_periods_for_driver(
        &self,
        driver: DriverId,
        range: Option<TimeWindow>,
        status: Option<RestStatus>,
        rest_type: Option<RestType>,
    ) -> RepositoryResult<Vec<RestPeriod>>;
}

/// Driver availability lookups (the engine does not own driver identity).
#[async_trait]
pub trait DriverRepository: Send + Sync {
    /// Fetch a driver by id.
    async fn get_driver(&self, id: DriverId) -> RepositoryResult<Driver>;

    /// All known drivers.
    async fn list_drivers(&self) -> RepositoryResult<Vec<Driver>>;

    /// Insert or replace a driver record (integration seam for the external
    /// fleet registry).
    async fn upsert_driver(&self, driver: &Driver) -> RepositoryResult<()>;

    /// Flip a driver's availability flag.
    async fn set_driver_available(&self, id: DriverId, available: bool) -> RepositoryResult<()>;
}

/// Load status lookups (deletion policy only).
#[async_trait]
pub trait LoadRepository: Send + Sync {
    /// Fetch a load by id.
    async fn get_load(&self, id: LoadId) -> RepositoryResult<Load>;

    /// Insert or replace a load record (integration seam for the external
    /// load board).
    async fn upsert_load(&self, load: &Load) -> RepositoryResult<()>;
}

/// The full repository surface the service layer consumes.
#[async_trait]
pub trait FleetRepository:
    ScheduleRepository + RestPeriodRepository + DriverRepository + LoadRepository
{
    /// Cheap readiness probe.
    async fn health_check(&self) -> RepositoryResult<bool>;
}
