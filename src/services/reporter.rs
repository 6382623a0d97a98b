//! Compliance reporting over historical schedules and rest periods.
//!
//! Aggregates the trailing week of completed driving and rest into a status
//! summary, and computes when a driver must next take a qualifying rest.
//! Operations take an explicit `as_of` instant rather than reading a wall
//! clock, so reports are reproducible and dispatch can evaluate a future
//! point in time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::api::{
    ComplianceStatus, DriverId, RestStatus, RestType, ScheduleStatus, TimeWindow,
};
use crate::db::repository::{
    DriverRepository, FleetRepository, RestPeriodRepository, ScheduleRepository,
};
use crate::error::{ScheduleError, ScheduleResult};
use crate::models::rules::HosRules;

/// Aggregates compliance history for dispatch and auditing.
pub struct ComplianceReporter {
    repo: Arc<dyn FleetRepository>,
    rules: HosRules,
}

impl ComplianceReporter {
    pub fn new(repo: Arc<dyn FleetRepository>, rules: HosRules) -> Self {
        Self { repo, rules }
    }

    /// Summarize a driver's regulatory standing over the 7 days before
    /// `as_of`.
    ///
    /// Sums completed driving schedules and completed rest periods, flags a
    /// missing or stale daily rest (older than 24 h), an insufficient weekly
    /// rest total, and an overdue long rest, and reports the next instant a
    /// qualifying rest is required.
    pub async fn check_rest_compliance(
        &self,
        driver: DriverId,
        as_of: DateTime<Utc>,
    ) -> ScheduleResult<ComplianceStatus> {
        self.repo
            .get_driver(driver)
            .await
            .map_err(|e| ScheduleError::from_lookup(e, format!("driver {}", driver)))?;

        let week = TimeWindow {
            start: as_of - Duration::days(7),
            end: as_of,
        };

        let completed = [ScheduleStatus::Completed];
        let schedules = self
            .repo
            .schedules_for_driver(driver, Some(week), Some(&completed))
            .await?;
        let total_driving = schedules
            .iter()
            .filter_map(|s| s.window.clip_to(&week))
            .fold(Duration::zero(), |acc, clip| acc + clip.duration());

        let rests = self
            .repo
            .rest_periods_for_driver(driver, Some(week), Some(RestStatus::Completed), None)
            .await?;
        let total_rest = rests
            .iter()
            .filter_map(|r| r.window.clip_to(&week))
            .fold(Duration::zero(), |acc, clip| acc + clip.duration());

        let mut violations = Vec::new();

        // Daily rest recency
        let daily_rests = self
            .repo
            .rest_periods_for_driver(
                driver,
                None,
                Some(RestStatus::Completed),
                Some(RestType::DailyRest),
            )
            .await?;
        match daily_rests
            .iter()
            .filter(|r| r.window.end <= as_of)
            .map(|r| r.window.end)
            .max()
        {
            None => violations.push("no completed daily rest on record".to_string()),
            Some(end) if as_of - end > Duration::hours(24) => violations.push(format!(
                "last daily rest ended {} hours ago (limit 24)",
                (as_of - end).num_hours()
            )),
            Some(_) => {}
        }

        // Weekly rest total within the trailing week
        let weekly_total = rests
            .iter()
            .filter(|r| r.rest_type == RestType::WeeklyRest)
            .filter_map(|r| r.window.clip_to(&week))
            .fold(Duration::zero(), |acc, clip| acc + clip.duration());
        if weekly_total < self.rules.minimum_weekly_rest() {
            violations.push(format!(
                "weekly rest of {} h is below the required {} h",
                weekly_total.num_hours(),
                self.rules.minimum_weekly_rest().num_hours()
            ));
        }

        // Long-rest cadence
        let long_rest_end = self
            .repo
            .rest_periods_for_driver(driver, None, Some(RestStatus::Completed), None)
            .await?
            .into_iter()
            .filter(|r| r.rest_type != RestType::ShortBreak)
            .filter(|r| r.window.end <= as_of)
            .map(|r| r.window.end)
            .max();
        if let Some(end) = long_rest_end {
            if as_of - end > self.rules.long_rest_cadence() {
                violations.push(format!(
                    "no daily or weekly rest in the last {} days",
                    self.rules.days_between_required_rests
                ));
            }
        }

        let next_required_rest = self.next_required_rest_time(driver, as_of).await?;

        debug!(
            "driver {} trailing-week report: {} min driving, {} min rest, {} violations",
            driver,
            total_driving.num_minutes(),
            total_rest.num_minutes(),
            violations.len()
        );

        let notes = if violations.is_empty() {
            None
        } else {
            Some(format!(
                "{} violation(s) found in the trailing 7 days",
                violations.len()
            ))
        };

        Ok(ComplianceStatus {
            is_compliant: violations.is_empty(),
            total_driving_minutes: total_driving.num_minutes(),
            total_rest_minutes: total_rest.num_minutes(),
            next_required_rest,
            violations,
            notes,
        })
    }

    /// The instant by which the driver must next take a qualifying rest.
    ///
    /// Accumulates driving since the last completed rest (bounded to the
    /// trailing 7 days when no rest exists). If the accumulated driving
    /// already meets the continuous-driving allowance the answer is `as_of`
    /// itself; otherwise it is the last rest's end plus the unused allowance.
    pub async fn next_required_rest_time(
        &self,
        driver: DriverId,
        as_of: DateTime<Utc>,
    ) -> ScheduleResult<DateTime<Utc>> {
        let rests = self
            .repo
            .rest_periods_for_driver(driver, None, Some(RestStatus::Completed), None)
            .await?;
        let last_rest_end = rests
            .iter()
            .filter(|r| r.window.end <= as_of)
            .map(|r| r.window.end)
            .max();

        let accumulation_start = last_rest_end.unwrap_or(as_of - Duration::days(7));
        let driving_since = if accumulation_start < as_of {
            let span = TimeWindow {
                start: accumulation_start,
                end: as_of,
            };
            let statuses = ScheduleStatus::non_cancelled();
            self.repo
                .schedules_for_driver(driver, Some(span), Some(&statuses))
                .await?
                .iter()
                .filter_map(|s| s.window.clip_to(&span))
                .fold(Duration::zero(), |acc, clip| acc + clip.duration())
        } else {
            Duration::zero()
        };

        let allowance = self.rules.required_break_after();
        if driving_since >= allowance {
            return Ok(as_of);
        }

        let remaining = allowance - driving_since;
        Ok(match last_rest_end {
            Some(end) => end + remaining,
            None => as_of + remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Driver, RestPeriod, Schedule};
    use crate::db::repository::{
        DriverRepository, RestPeriodRepository, ScheduleRepository,
    };
    use crate::db::LocalRepository;
    use chrono::TimeZone;

    fn t(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, day, hour, min, 0).unwrap()
    }

    fn w(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeWindow {
        TimeWindow { start, end }
    }

    async fn seed_driver(repo: &LocalRepository, id: i64) -> DriverId {
        let driver = DriverId::new(id);
        repo.upsert_driver(&Driver {
            id: driver,
            name: format!("driver-{}", id),
            available: true,
        })
        .await
        .unwrap();
        driver
    }

    async fn seed_completed_schedule(repo: &LocalRepository, driver: DriverId, window: TimeWindow) {
        let mut schedule = Schedule::new(driver, window);
        schedule.status = ScheduleStatus::Completed;
        repo.create_schedule(&schedule).await.unwrap();
    }

    async fn seed_completed_rest(
        repo: &LocalRepository,
        driver: DriverId,
        window: TimeWindow,
        rest_type: RestType,
    ) {
        let mut rest = RestPeriod::new(driver, window, rest_type);
        rest.status = RestStatus::Completed;
        repo.create_rest_period(&rest).await.unwrap();
    }

    fn reporter(repo: &Arc<LocalRepository>) -> ComplianceReporter {
        let repo: Arc<dyn FleetRepository> = repo.clone();
        ComplianceReporter::new(repo, HosRules::default())
    }

    #[tokio::test]
    async fn test_unknown_driver_is_not_found() {
        let repo = Arc::new(LocalRepository::new());
        let reporter = reporter(&repo);
        let err = reporter
            .check_rest_compliance(DriverId::new(404), t(10, 12, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ScheduleError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_trailing_week_totals() {
        let repo = Arc::new(LocalRepository::new());
        let driver = seed_driver(&repo, 1).await;

        // 8 h driving inside the week, 8 h before it
        seed_completed_schedule(&repo, driver, w(t(8, 8, 0), t(8, 16, 0))).await;
        seed_completed_schedule(&repo, driver, w(t(1, 8, 0), t(1, 16, 0))).await;
        seed_completed_rest(&repo, driver, w(t(8, 18, 0), t(9, 6, 0)), RestType::DailyRest).await;

        let reporter = reporter(&repo);
        let status = reporter
            .check_rest_compliance(driver, t(10, 12, 0))
            .await
            .unwrap();

        assert_eq!(status.total_driving_minutes, 8 * 60);
        assert_eq!(status.total_rest_minutes, 12 * 60);
    }

    #[tokio::test]
    async fn test_missing_daily_rest_flagged() {
        let repo = Arc::new(LocalRepository::new());
        let driver = seed_driver(&repo, 1).await;
        let reporter = reporter(&repo);

        let status = reporter
            .check_rest_compliance(driver, t(10, 12, 0))
            .await
            .unwrap();
        assert!(!status.is_compliant);
        assert!(status
            .violations
            .iter()
            .any(|v| v.contains("no completed daily rest")));
    }

    #[tokio::test]
    async fn test_stale_daily_rest_flagged() {
        let repo = Arc::new(LocalRepository::new());
        let driver = seed_driver(&repo, 1).await;
        // ended 36 h before as_of
        seed_completed_rest(&repo, driver, w(t(8, 12, 0), t(9, 0, 0)), RestType::DailyRest).await;

        let reporter = reporter(&repo);
        let status = reporter
            .check_rest_compliance(driver, t(10, 12, 0))
            .await
            .unwrap();
        assert!(status
            .violations
            .iter()
            .any(|v| v.contains("last daily rest ended")));
    }

    #[tokio::test]
    async fn test_sufficient_history_is_compliant() {
        let repo = Arc::new(LocalRepository::new());
        let driver = seed_driver(&repo, 1).await;

        // 45 h weekly rest inside the window and a fresh daily rest
        seed_completed_rest(&repo, driver, w(t(4, 12, 0), t(6, 9, 0)), RestType::WeeklyRest).await;
        seed_completed_rest(&repo, driver, w(t(9, 18, 0), t(10, 6, 0)), RestType::DailyRest).await;

        let reporter = reporter(&repo);
        let status = reporter
            .check_rest_compliance(driver, t(10, 12, 0))
            .await
            .unwrap();
        assert!(status.is_compliant, "violations: {:?}", status.violations);
        assert!(status.notes.is_none());
    }

    #[tokio::test]
    async fn test_next_rest_now_when_allowance_spent() {
        let repo = Arc::new(LocalRepository::new());
        let driver = seed_driver(&repo, 1).await;

        seed_completed_rest(&repo, driver, w(t(9, 18, 0), t(10, 5, 0)), RestType::DailyRest).await;
        // 5 h driving since the rest: over the 4.5 h allowance
        seed_completed_schedule(&repo, driver, w(t(10, 5, 0), t(10, 10, 0))).await;

        let reporter = reporter(&repo);
        let as_of = t(10, 11, 0);
        let next = reporter.next_required_rest_time(driver, as_of).await.unwrap();
        assert_eq!(next, as_of);
    }

    #[tokio::test]
    async fn test_next_rest_from_unused_allowance() {
        let repo = Arc::new(LocalRepository::new());
        let driver = seed_driver(&repo, 1).await;

        seed_completed_rest(&repo, driver, w(t(9, 18, 0), t(10, 5, 0)), RestType::DailyRest).await;
        // 2 h driven since the rest ended at 05:00: 2.5 h of allowance left
        seed_completed_schedule(&repo, driver, w(t(10, 5, 0), t(10, 7, 0))).await;

        let reporter = reporter(&repo);
        let next = reporter
            .next_required_rest_time(driver, t(10, 8, 0))
            .await
            .unwrap();
        assert_eq!(next, t(10, 7, 30));
    }

    #[tokio::test]
    async fn test_next_rest_with_no_history() {
        let repo = Arc::new(LocalRepository::new());
        let driver = seed_driver(&repo, 1).await;

        let reporter = reporter(&repo);
        let as_of = t(10, 8, 0);
        let next = reporter.next_required_rest_time(driver, as_of).await.unwrap();
        // full allowance from now
        assert_eq!(next, as_of + Duration::minutes(270));
    }
}
