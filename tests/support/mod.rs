//! Shared helpers for integration tests: fixed-clock time builders, seeded
//! repositories, and pre-wired services.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use fleet_hos::api::{
    Driver, DriverId, Load, LoadId, LoadStatus, RestPeriod, RestStatus, RestType, Schedule,
    ScheduleStatus, TimeWindow,
};
use fleet_hos::db::repository::{
    DriverRepository, LoadRepository, RestPeriodRepository, ScheduleRepository,
};
use fleet_hos::db::{FleetRepository, LocalRepository};
use fleet_hos::models::rules::HosRules;
use fleet_hos::services::{ComplianceReporter, RecurringScheduler, Scheduler};

/// An instant on a fixed test calendar (September 2025, UTC).
pub fn at(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, day, hour, min, 0).unwrap()
}

pub fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeWindow {
    TimeWindow { start, end }
}

/// A repository plus every service wired over it, sharing one lock registry.
pub struct TestFleet {
    pub repo: Arc<LocalRepository>,
    pub scheduler: Scheduler,
    pub recurring: RecurringScheduler,
    pub reporter: ComplianceReporter,
}

pub fn fleet() -> TestFleet {
    fleet_with_rules(HosRules::default())
}

pub fn fleet_with_rules(rules: HosRules) -> TestFleet {
    let repo = Arc::new(LocalRepository::new());
    let dyn_repo: Arc<dyn FleetRepository> = repo.clone();
    let scheduler = Scheduler::new(dyn_repo.clone(), rules.clone());
    let recurring = RecurringScheduler::sharing(&scheduler);
    let reporter = ComplianceReporter::new(dyn_repo, rules);
    TestFleet {
        repo,
        scheduler,
        recurring,
        reporter,
    }
}

pub async fn seed_driver(repo: &LocalRepository, id: i64, available: bool) -> DriverId {
    let driver = DriverId::new(id);
    repo.upsert_driver(&Driver {
        id: driver,
        name: format!("driver-{}", id),
        available,
    })
    .await
    .expect("seed driver");
    driver
}

pub async fn seed_load(repo: &LocalRepository, id: i64, status: LoadStatus) -> LoadId {
    let load = LoadId::new(id);
    repo.upsert_load(&Load { id: load, status }).await.expect("seed load");
    load
}

/// Insert a completed rest period directly, bypassing the scheduler.
pub async fn seed_completed_rest(
    repo: &LocalRepository,
    driver: DriverId,
    window: TimeWindow,
    rest_type: RestType,
) -> RestPeriod {
    let mut rest = RestPeriod::new(driver, window, rest_type);
    rest.status = RestStatus::Completed;
    repo.create_rest_period(&rest).await.expect("seed rest period")
}

/// Insert a completed schedule directly, bypassing validation.
pub async fn seed_completed_schedule(
    repo: &LocalRepository,
    driver: DriverId,
    window: TimeWindow,
) -> Schedule {
    let mut schedule = Schedule::new(driver, window);
    schedule.status = ScheduleStatus::Completed;
    repo.create_schedule(&schedule).await.expect("seed schedule")
}
