//! In-memory repository implementation.
//!
//! Backs unit tests and local development. State lives in a single
//! `parking_lot::RwLock`; no guard is ever held across an await point, so the
//! async trait surface stays cheap. Ids are assigned monotonically per entity
//! type. Recurring series are indexed arena-style: parent schedule id to the
//! ordered list of instance ids.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::api::{
    Driver, DriverId, Load, LoadId, Recurrence, RestPeriod, RestPeriodId, RestStatus, RestType,
    Schedule, ScheduleId, ScheduleStatus, TimeWindow,
};
use crate::db::models::RepositoryCounts;
use crate::db::repository::{
    DriverRepository, ErrorContext, FleetRepository, LoadRepository, RepositoryError,
    RepositoryResult, RestPeriodRepository, ScheduleRepository,
};

#[derive(Default)]
struct State {
    schedules: HashMap<i64, Schedule>,
    rest_periods: HashMap<i64, RestPeriod>,
    drivers: HashMap<i64, Driver>,
    loads: HashMap<i64, Load>,
    /// Parent schedule id -> instance schedule ids, in creation order.
    series: HashMap<i64, Vec<i64>>,
    next_schedule_id: i64,
    next_rest_period_id: i64,
}

impl State {
    fn next_schedule_id(&mut self) -> i64 {
        self.next_schedule_id += 1;
        self.next_schedule_id
    }

    fn next_rest_period_id(&mut self) -> i64 {
        self.next_rest_period_id += 1;
        self.next_rest_period_id
    }
}

/// In-memory repository for unit testing and local development.
#[derive(Default)]
pub struct LocalRepository {
    state: RwLock<State>,
}

impl LocalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row counts, for diagnostics and tests.
    pub fn counts(&self) -> RepositoryCounts {
        let state = self.state.read();
        RepositoryCounts {
            schedules: state.schedules.len(),
            rest_periods: state.rest_periods.len(),
            drivers: state.drivers.len(),
            loads: state.loads.len(),
        }
    }
}

fn schedule_not_found(id: ScheduleId, operation: &str) -> RepositoryError {
    RepositoryError::not_found(format!("Schedule {} does not exist", id)).with_context(
        ErrorContext::new(operation)
            .with_entity("schedule")
            .with_entity_id(id),
    )
}

fn rest_period_not_found(id: RestPeriodId, operation: &str) -> RepositoryError {
    RepositoryError::not_found(format!("Rest period {} does not exist", id)).with_context(
        ErrorContext::new(operation)
            .with_entity("rest_period")
            .with_entity_id(id),
    )
}

#[async_trait]
impl ScheduleRepository for LocalRepository {
    async fn create_schedule(&self, schedule: &Schedule) -> RepositoryResult<Schedule> {
        let mut state = self.state.write();
        let id = state.next_schedule_id();

        let mut committed = schedule.clone();
        committed.id = Some(ScheduleId::new(id));

        if let Some(Recurrence::Instance { parent, .. }) = committed.recurrence {
            state.series.entry(parent.value()).or_default().push(id);
        }

        state.schedules.insert(id, committed.clone());
        Ok(committed)
    }

    async fn get_schedule(&self, id: ScheduleId) -> RepositoryResult<Schedule> {
        self.state
            .read()
            .schedules
            .get(&id.value())
            .cloned()
            .ok_or_else(|| schedule_not_found(id, "get_schedule"))
    }

    async fn update_schedule(&self, schedule: &Schedule) -> RepositoryResult<()> {
        let id = schedule.id.ok_or_else(|| {
            RepositoryError::validation("Cannot update a schedule without an id")
                .with_context(ErrorContext::new("update_schedule").with_entity("schedule"))
        })?;

        let mut state = self.state.write();
        if !state.schedules.contains_key(&id.value()) {
            return Err(schedule_not_found(id, "update_schedule"));
        }
        state.schedules.insert(id.value(), schedule.clone());
        Ok(())
    }

    async fn delete_schedule(&self, id: ScheduleId) -> RepositoryResult<()> {
        let mut state = self.state.write();
        let removed = state
            .schedules
            .remove(&id.value())
            .ok_or_else(|| schedule_not_found(id, "delete_schedule"))?;

        match removed.recurrence {
            Some(Recurrence::Instance { parent, .. }) => {
                if let Some(ids) = state.series.get_mut(&parent.value()) {
                    ids.retain(|i| *i != id.value());
                }
            }
            Some(Recurrence::Parent { .. }) => {
                state.series.remove(&id.value());
            }
            None => {}
        }
        Ok(())
    }

    async fn schedules_for_driver(
        &self,
        driver: DriverId,
        range: Option<TimeWindow>,
        statuses: Option<&[ScheduleStatus]>,
    ) -> RepositoryResult<Vec<Schedule>> {
        let state = self.state.read();
        let mut found: Vec<Schedule> = state
            .schedules
            .values()
            .filter(|s| s.driver_id == driver)
            .filter(|s| range.map_or(true, |r| s.window.overlaps(&r)))
            .filter(|s| statuses.map_or(true, |accepted| accepted.contains(&s.status)))
            .cloned()
            .collect();
        found.sort_by_key(|s| s.window.start);
        Ok(found)
    }

    async fn instances_of(&self, parent: ScheduleId) -> RepositoryResult<Vec<Schedule>> {
        let state = self.state.read();
        let mut instances: Vec<Schedule> = state
            .series
            .get(&parent.value())
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.schedules.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        instances.sort_by_key(|s| s.instance_number().unwrap_or(u32::MAX));
        Ok(instances)
    }
}

#[async_trait]
impl RestPeriodRepository for LocalRepository {
    async fn create_rest_period(&self, rest: &RestPeriod) -> RepositoryResult<RestPeriod> {
        let mut state = self.state.write();
        let id = state.next_rest_period_id();

        let mut committed = rest.clone();
        committed.id = Some(RestPeriodId::new(id));
        state.rest_periods.insert(id, committed.clone());
        Ok(committed)
    }

    async fn get_rest_period(&self, id: RestPeriodId) -> RepositoryResult<RestPeriod> {
        self.state
            .read()
            .rest_periods
            .get(&id.value())
            .cloned()
            .ok_or_else(|| rest_period_not_found(id, "get_rest_period"))
    }

    async fn update_rest_period(&self, rest: &RestPeriod) -> RepositoryResult<()> {
        let id = rest.id.ok_or_else(|| {
            RepositoryError::validation("Cannot update a rest period without an id")
                .with_context(ErrorContext::new("update_rest_period").with_entity("rest_period"))
        })?;

        let mut state = self.state.write();
        if !state.rest_periods.contains_key(&id.value()) {
            return Err(rest_period_not_found(id, "update_rest_period"));
        }
        state.rest_periods.insert(id.value(), rest.clone());
        Ok(())
    }

    async fn rest_periods_for_driver(
        &self,
        driver: DriverId,
        range: Option<TimeWindow>,
        status: Option<RestStatus>,
        rest_type: Option<RestType>,
    ) -> RepositoryResult<Vec<RestPeriod>> {
        let state = self.state.read();
        let mut found: Vec<RestPeriod> = state
            .rest_periods
            .values()
            .filter(|r| r.driver_id == driver)
            .filter(|r| range.map_or(true, |range| r.window.overlaps(&range)))
            .filter(|r| status.map_or(true, |s| r.status == s))
            .filter(|r| rest_type.map_or(true, |t| r.rest_type == t))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.window.start);
        Ok(found)
    }
}

#[async_trait]
impl DriverRepository for LocalRepository {
    async fn get_driver(&self, id: DriverId) -> RepositoryResult<Driver> {
        self.state.read().drivers.get(&id.value()).cloned().ok_or_else(|| {
            RepositoryError::not_found(format!("Driver {} does not exist", id)).with_context(
                ErrorContext::new("get_driver")
                    .with_entity("driver")
                    .with_entity_id(id),
            )
        })
    }

    async fn list_drivers(&self) -> RepositoryResult<Vec<Driver>> {
        let state = self.state.read();
        let mut drivers: Vec<Driver> = state.drivers.values().cloned().collect();
        drivers.sort_by_key(|d| d.id);
        Ok(drivers)
    }

    async fn upsert_driver(&self, driver: &Driver) -> RepositoryResult<()> {
        self.state
            .write()
            .drivers
            .insert(driver.id.value(), driver.clone());
        Ok(())
    }

    async fn set_driver_available(&self, id: DriverId, available: bool) -> RepositoryResult<()> {
        let mut state = self.state.write();
        let driver = state.drivers.get_mut(&id.value()).ok_or_else(|| {
            RepositoryError::not_found(format!("Driver {} does not exist", id)).with_context(
                ErrorContext::new("set_driver_available")
                    .with_entity("driver")
                    .with_entity_id(id),
            )
        })?;
        driver.available = available;
        Ok(())
    }
}

#[async_trait]
impl LoadRepository for LocalRepository {
    async fn get_load(&self, id: LoadId) -> RepositoryResult<Load> {
        self.state.read().loads.get(&id.value()).cloned().ok_or_else(|| {
            RepositoryError::not_found(format!("Load {} does not exist", id)).with_context(
                ErrorContext::new("get_load")
                    .with_entity("load")
                    .with_entity_id(id),
            )
        })
    }

    async fn upsert_load(&self, load: &Load) -> RepositoryResult<()> {
        self.state.write().loads.insert(load.id.value(), load.clone());
        Ok(())
    }
}

#[async_trait]
impl FleetRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn window(day: u32, start_h: u32, end_h: u32) -> TimeWindow {
        TimeWindow {
            start: Utc.with_ymd_and_hms(2025, 5, day, start_h, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 5, day, end_h, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let repo = LocalRepository::new();
        let a = repo
            .create_schedule(&Schedule::new(DriverId::new(1), window(1, 8, 12)))
            .await
            .unwrap();
        let b = repo
            .create_schedule(&Schedule::new(DriverId::new(1), window(2, 8, 12)))
            .await
            .unwrap();
        assert_eq!(a.id, Some(ScheduleId::new(1)));
        assert_eq!(b.id, Some(ScheduleId::new(2)));
    }

    #[tokio::test]
    async fn test_range_filter_uses_half_open_overlap() {
        let repo = LocalRepository::new();
        repo.create_schedule(&Schedule::new(DriverId::new(1), window(1, 8, 12)))
            .await
            .unwrap();

        // touching interval does not overlap
        let touching = repo
            .schedules_for_driver(DriverId::new(1), Some(window(1, 12, 16)), None)
            .await
            .unwrap();
        assert!(touching.is_empty());

        let intersecting = repo
            .schedules_for_driver(DriverId::new(1), Some(window(1, 11, 16)), None)
            .await
            .unwrap();
        assert_eq!(intersecting.len(), 1);
    }

    #[tokio::test]
    async fn test_status_filter() {
        let repo = LocalRepository::new();
        let mut cancelled = Schedule::new(DriverId::new(1), window(1, 8, 12));
        cancelled.status = ScheduleStatus::Cancelled;
        repo.create_schedule(&cancelled).await.unwrap();
        repo.create_schedule(&Schedule::new(DriverId::new(1), window(2, 8, 12)))
            .await
            .unwrap();

        let statuses = ScheduleStatus::non_cancelled();
        let active = repo
            .schedules_for_driver(DriverId::new(1), None, Some(&statuses))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].status, ScheduleStatus::Pending);
    }

    #[tokio::test]
    async fn test_series_index_tracks_instances() {
        let repo = LocalRepository::new();
        let parent = repo
            .create_schedule(&Schedule::new(DriverId::new(1), window(1, 8, 12)))
            .await
            .unwrap();
        let parent_id = parent.id.unwrap();

        for number in [3u32, 2u32] {
            let mut instance = Schedule::new(DriverId::new(1), window(1 + number, 8, 12));
            instance.recurrence = Some(Recurrence::Instance {
                parent: parent_id,
                number,
                modified: false,
            });
            repo.create_schedule(&instance).await.unwrap();
        }

        let instances = repo.instances_of(parent_id).await.unwrap();
        assert_eq!(instances.len(), 2);
        // ordered by instance number regardless of insertion order
        assert_eq!(instances[0].instance_number(), Some(2));
        assert_eq!(instances[1].instance_number(), Some(3));

        let second = instances[0].id.unwrap();
        repo.delete_schedule(second).await.unwrap();
        assert_eq!(repo.instances_of(parent_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_requires_existing_record() {
        let repo = LocalRepository::new();
        let mut phantom = Schedule::new(DriverId::new(1), window(1, 8, 12));
        phantom.id = Some(ScheduleId::new(99));
        let err = repo.update_schedule(&phantom).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_driver_and_load_roundtrip() {
        let repo = LocalRepository::new();
        let driver = Driver {
            id: DriverId::new(5),
            name: "M. Kovacs".to_string(),
            available: true,
        };
        repo.upsert_driver(&driver).await.unwrap();
        assert_eq!(repo.get_driver(DriverId::new(5)).await.unwrap(), driver);

        repo.set_driver_available(DriverId::new(5), false).await.unwrap();
        assert!(!repo.get_driver(DriverId::new(5)).await.unwrap().available);

        let load = Load {
            id: LoadId::new(9),
            status: crate::api::LoadStatus::InTransit,
        };
        repo.upsert_load(&load).await.unwrap();
        assert_eq!(repo.get_load(LoadId::new(9)).await.unwrap(), load);
    }

    #[tokio::test]
    async fn test_counts() {
        let repo = LocalRepository::new();
        repo.create_schedule(&Schedule::new(DriverId::new(1), window(1, 8, 12)))
            .await
            .unwrap();
        let counts = repo.counts();
        assert_eq!(counts.schedules, 1);
        assert_eq!(counts.rest_periods, 0);
    }
}
