//! Hours-of-service compliance checking.
//!
//! Stateless evaluator of the regulatory predicates: rest compliance,
//! continuous-driving compliance, and daily driving-time aggregation. Every
//! operation is read-only against history; nothing here writes to the store.
//!
//! Interval comparisons are half-open throughout: a schedule ending exactly
//! when another begins does not overlap it, and a rest ending exactly at a
//! candidate's start still precedes it.

use std::sync::Arc;

use chrono::Duration;
use log::debug;

use crate::api::{DriverId, RestStatus, RestType, Schedule, ScheduleId, ScheduleStatus, TimeWindow};
use crate::db::repository::{
    DriverRepository, FleetRepository, RepositoryError, RepositoryResult, RestPeriodRepository,
    ScheduleRepository,
};
use crate::models::rules::HosRules;

/// Read-only compliance evaluator.
///
/// The regulation constants are injected at construction and treated as
/// immutable for the duration of any validation pipeline run; tests exercise
/// different regulatory regimes by constructing checkers with different
/// rules.
pub struct ComplianceChecker {
    repo: Arc<dyn FleetRepository>,
    rules: HosRules,
}

impl ComplianceChecker {
    pub fn new(repo: Arc<dyn FleetRepository>, rules: HosRules) -> Self {
        Self { repo, rules }
    }

    pub fn rules(&self) -> &HosRules {
        &self.rules
    }

    /// Whether a candidate window satisfies the rest-period requirement.
    ///
    /// Locates the most recent completed rest ending at or before the
    /// candidate start:
    ///
    /// - no rest on record: allowed only when the driver has no non-cancelled
    ///   schedules at all (bootstrap exception for a driver's very first
    ///   assignment);
    /// - daily or weekly rest: its duration must meet the daily-rest minimum;
    /// - short break: the continuous driving span that ended at the break
    ///   must not have exceeded the maximum driving period.
    pub async fn validate_rest_compliance(
        &self,
        driver: DriverId,
        window: &TimeWindow,
    ) -> RepositoryResult<bool> {
        let rests = self
            .repo
            .rest_periods_for_driver(driver, None, Some(RestStatus::Completed), None)
            .await?;

        let last_rest = rests
            .into_iter()
            .filter(|r| r.window.end <= window.start)
            .max_by_key(|r| r.window.end);

        let Some(rest) = last_rest else {
            let statuses = ScheduleStatus::non_cancelled();
            let prior = self
                .repo
                .schedules_for_driver(driver, None, Some(&statuses))
                .await?;
            let first_assignment = prior.is_empty();
            if !first_assignment {
                debug!(
                    "driver {} has schedules but no completed rest before {}",
                    driver, window.start
                );
            }
            return Ok(first_assignment);
        };

        match rest.rest_type {
            RestType::DailyRest | RestType::WeeklyRest => {
                Ok(rest.window.duration() >= self.rules.minimum_rest())
            }
            RestType::ShortBreak => {
                // The break resets the clock only if the span it interrupted
                // was itself within the continuous-driving limit.
                let statuses = ScheduleStatus::non_cancelled();
                let schedules = self
                    .repo
                    .schedules_for_driver(driver, None, Some(&statuses))
                    .await?;
                let before_break = schedules
                    .into_iter()
                    .filter(|s| s.window.end <= rest.window.start)
                    .max_by_key(|s| s.window.end);
                match before_break {
                    None => Ok(true),
                    Some(prior) => {
                        let span = rest.window.start - prior.window.start;
                        Ok(span <= self.rules.maximum_driving_period())
                    }
                }
            }
        }
    }

    /// Whether a candidate window keeps continuous driving under the limit.
    ///
    /// Finds the immediately preceding non-cancelled schedule ending at or
    /// before the candidate start (optionally excluding a schedule id, used
    /// during updates). No predecessor means compliant. A completed rest of
    /// at least the minimum break duration falling entirely between the
    /// predecessor's end and the candidate's start resets the counter.
    /// Otherwise the span from the predecessor's start to the candidate's
    /// end, minus the idle gap between them, must stay within the
    /// required-break-after limit.
    pub async fn validate_continuous_driving(
        &self,
        driver: DriverId,
        window: &TimeWindow,
        exclude: Option<ScheduleId>,
    ) -> RepositoryResult<bool> {
        let statuses = ScheduleStatus::non_cancelled();
        let schedules = self
            .repo
            .schedules_for_driver(driver, None, Some(&statuses))
            .await?;

        let predecessor = schedules
            .into_iter()
            .filter(|s| exclude.map_or(true, |e| s.id != Some(e)))
            .filter(|s| s.window.end <= window.start)
            .max_by_key(|s| s.window.end);

        let Some(predecessor) = predecessor else {
            return Ok(true);
        };

        if predecessor.window.end < window.start {
            let rests = self
                .repo
                .rest_periods_for_driver(driver, None, Some(RestStatus::Completed), None)
                .await?;
            let qualifying_break = rests.iter().any(|r| {
                r.window.start >= predecessor.window.end
                    && r.window.end <= window.start
                    && r.window.duration() >= self.rules.minimum_break()
            });
            if qualifying_break {
                return Ok(true);
            }
        }

        let gap = window.start - predecessor.window.end;
        let continuous = (window.end - predecessor.window.start) - gap;
        let compliant = continuous <= self.rules.required_break_after();
        if !compliant {
            debug!(
                "driver {} continuous driving would reach {} min (limit {} min)",
                driver,
                continuous.num_minutes(),
                self.rules.required_break_after().num_minutes()
            );
        }
        Ok(compliant)
    }

    /// Total driving time for a driver clipped to one interval (normally a
    /// UTC calendar day).
    ///
    /// Sums all non-cancelled schedules overlapping `day` (optionally
    /// excluding one id), each clipped to `day`, plus the candidate if given.
    pub async fn daily_driving_time(
        &self,
        driver: DriverId,
        day: &TimeWindow,
        candidate: Option<&Schedule>,
        exclude: Option<ScheduleId>,
    ) -> RepositoryResult<Duration> {
        let statuses = ScheduleStatus::non_cancelled();
        let schedules = self
            .repo
            .schedules_for_driver(driver, Some(*day), Some(&statuses))
            .await?;

        let mut total = Duration::zero();
        for schedule in schedules
            .iter()
            .filter(|s| exclude.map_or(true, |e| s.id != Some(e)))
        {
            if let Some(clipped) = schedule.window.clip_to(day) {
                total = total + clipped.duration();
            }
        }
        if let Some(candidate) = candidate {
            if let Some(clipped) = candidate.window.clip_to(day) {
                total = total + clipped.duration();
            }
        }
        Ok(total)
    }

    /// Composite availability gate used by dispatch search.
    ///
    /// The driver must exist and be flagged available, have no overlapping
    /// schedule, stay under the daily driving cap with the candidate window
    /// included, and pass both rest and continuous-driving validation. An
    /// unknown driver is simply unavailable, not an error.
    pub async fn check_driver_availability(
        &self,
        driver: DriverId,
        window: &TimeWindow,
    ) -> RepositoryResult<bool> {
        let record = match self.repo.get_driver(driver).await {
            Ok(record) => record,
            Err(RepositoryError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        if !record.available {
            return Ok(false);
        }

        let statuses = ScheduleStatus::non_cancelled();
        let overlapping = self
            .repo
            .schedules_for_driver(driver, Some(*window), Some(&statuses))
            .await?;
        if !overlapping.is_empty() {
            return Ok(false);
        }

        let candidate = Schedule::new(driver, *window);
        for day in window.calendar_days() {
            let total = self
                .daily_driving_time(driver, &day, Some(&candidate), None)
                .await?;
            if total > self.rules.max_daily_driving() {
                return Ok(false);
            }
        }

        if !self.validate_rest_compliance(driver, window).await? {
            return Ok(false);
        }
        if !self
            .validate_continuous_driving(driver, window, None)
            .await?
        {
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Driver, RestPeriod};
    use crate::db::repository::{
        DriverRepository, RestPeriodRepository, ScheduleRepository,
    };
    use crate::db::LocalRepository;
    use chrono::{TimeZone, Utc};

    fn t(day: u32, hour: u32, min: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, day, hour, min, 0).unwrap()
    }

    fn w(start: chrono::DateTime<Utc>, end: chrono::DateTime<Utc>) -> TimeWindow {
        TimeWindow { start, end }
    }

    fn checker(repo: &Arc<LocalRepository>) -> ComplianceChecker {
        let repo: Arc<dyn FleetRepository> = repo.clone();
        ComplianceChecker::new(repo, HosRules::default())
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

    #[tokio::test]
    async fn test_bootstrap_exception_first_assignment_only() {
        let repo = Arc::new(LocalRepository::new());
        let checker = checker(&repo);
        let driver = DriverId::new(1);

        // no history at all: allowed
        let first = w(t(1, 9, 0), t(1, 13, 0));
        assert!(checker
            .validate_rest_compliance(driver, &first)
            .await
            .unwrap());

        // once a schedule exists, the exception no longer applies
        repo.create_schedule(&Schedule::new(driver, first))
            .await
            .unwrap();
        let second = w(t(1, 14, 0), t(1, 18, 0));
        assert!(!checker
            .validate_rest_compliance(driver, &second)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_daily_rest_duration_qualifies() {
        let repo = Arc::new(LocalRepository::new());
        let checker = checker(&repo);
        let driver = DriverId::new(1);

        repo.create_schedule(&Schedule::new(driver, w(t(1, 9, 0), t(1, 17, 0))))
            .await
            .unwrap();
        // 13 h daily rest, candidate starts the moment it ends
        seed_completed_rest(&repo, driver, w(t(1, 17, 0), t(2, 6, 0)), RestType::DailyRest)
            .await;

        let candidate = w(t(2, 6, 0), t(2, 10, 0));
        assert!(checker
            .validate_rest_compliance(driver, &candidate)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_short_daily_rest_fails() {
        let repo = Arc::new(LocalRepository::new());
        let checker = checker(&repo);
        let driver = DriverId::new(1);

        repo.create_schedule(&Schedule::new(driver, w(t(1, 9, 0), t(1, 17, 0))))
            .await
            .unwrap();
        // only 6 h, below the 11 h minimum
        seed_completed_rest(&repo, driver, w(t(1, 17, 0), t(1, 23, 0)), RestType::DailyRest)
            .await;

        let candidate = w(t(1, 23, 0), t(2, 3, 0));
        assert!(!checker
            .validate_rest_compliance(driver, &candidate)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_short_break_checks_prebreak_span() {
        let repo = Arc::new(LocalRepository::new());
        let checker = checker(&repo);
        let driver = DriverId::new(1);

        // 4 h driving, within the 4.5 h maximum driving period
        repo.create_schedule(&Schedule::new(driver, w(t(1, 8, 0), t(1, 12, 0))))
            .await
            .unwrap();
        seed_completed_rest(&repo, driver, w(t(1, 12, 0), t(1, 13, 0)), RestType::ShortBreak)
            .await;
        assert!(checker
            .validate_rest_compliance(driver, &w(t(1, 13, 0), t(1, 16, 0)))
            .await
            .unwrap());

        // a second driver with a 6 h span before the break: too long
        let tired = DriverId::new(2);
        repo.create_schedule(&Schedule::new(tired, w(t(1, 6, 0), t(1, 12, 0))))
            .await
            .unwrap();
        seed_completed_rest(&repo, tired, w(t(1, 12, 0), t(1, 13, 0)), RestType::ShortBreak)
            .await;
        assert!(!checker
            .validate_rest_compliance(tired, &w(t(1, 13, 0), t(1, 16, 0)))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_continuous_no_predecessor_is_compliant() {
        let repo = Arc::new(LocalRepository::new());
        let checker = checker(&repo);
        let driver = DriverId::new(1);

        let candidate = w(t(1, 9, 0), t(1, 13, 0));
        assert!(checker
            .validate_continuous_driving(driver, &candidate, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_continuous_break_resets_counter() {
        let repo = Arc::new(LocalRepository::new());
        let checker = checker(&repo);
        let driver = DriverId::new(1);

        repo.create_schedule(&Schedule::new(driver, w(t(1, 8, 0), t(1, 12, 0))))
            .await
            .unwrap();

        // 4 h more driving after a 45 min qualifying break: fine
        seed_completed_rest(
            &repo,
            driver,
            w(t(1, 12, 0), t(1, 12, 45)),
            RestType::ShortBreak,
        )
        .await;
        let candidate = w(t(1, 12, 45), t(1, 16, 45));
        assert!(checker
            .validate_continuous_driving(driver, &candidate, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_continuous_without_break_exceeds() {
        let repo = Arc::new(LocalRepository::new());
        let checker = checker(&repo);
        let driver = DriverId::new(1);

        repo.create_schedule(&Schedule::new(driver, w(t(1, 8, 0), t(1, 11, 0))))
            .await
            .unwrap();

        // 3 h driven, 15 min gap with no recorded break, 2 h more requested:
        // 5 h continuous > 4.5 h limit
        let candidate = w(t(1, 11, 15), t(1, 13, 15));
        assert!(!checker
            .validate_continuous_driving(driver, &candidate, None)
            .await
            .unwrap());

        // excluding the predecessor (as an update of it would) passes
        let schedules = repo
            .schedules_for_driver(driver, None, None)
            .await
            .unwrap();
        let predecessor_id = schedules[0].id;
        assert!(checker
            .validate_continuous_driving(driver, &candidate, predecessor_id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_too_short_break_does_not_reset() {
        let repo = Arc::new(LocalRepository::new());
        let checker = checker(&repo);
        let driver = DriverId::new(1);

        repo.create_schedule(&Schedule::new(driver, w(t(1, 8, 0), t(1, 11, 0))))
            .await
            .unwrap();
        // 20 min < 45 min minimum break
        seed_completed_rest(
            &repo,
            driver,
            w(t(1, 11, 0), t(1, 11, 20)),
            RestType::ShortBreak,
        )
        .await;

        let candidate = w(t(1, 11, 20), t(1, 13, 30));
        assert!(!checker
            .validate_continuous_driving(driver, &candidate, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_daily_driving_time_clips_to_day() {
        let repo = Arc::new(LocalRepository::new());
        let checker = checker(&repo);
        let driver = DriverId::new(1);

        // 22:00 day 1 to 06:00 day 2: 2 h fall on day 1
        repo.create_schedule(&Schedule::new(driver, w(t(1, 22, 0), t(2, 6, 0))))
            .await
            .unwrap();

        let day1 = w(t(1, 0, 0), t(2, 0, 0));
        let total = checker
            .daily_driving_time(driver, &day1, None, None)
            .await
            .unwrap();
        assert_eq!(total, Duration::hours(2));

        let day2 = w(t(2, 0, 0), t(3, 0, 0));
        let total = checker
            .daily_driving_time(driver, &day2, None, None)
            .await
            .unwrap();
        assert_eq!(total, Duration::hours(6));
    }

    #[tokio::test]
    async fn test_daily_driving_time_includes_candidate_and_exclusion() {
        let repo = Arc::new(LocalRepository::new());
        let checker = checker(&repo);
        let driver = DriverId::new(1);

        let stored = repo
            .create_schedule(&Schedule::new(driver, w(t(1, 8, 0), t(1, 12, 0))))
            .await
            .unwrap();

        let day = w(t(1, 0, 0), t(2, 0, 0));
        let candidate = Schedule::new(driver, w(t(1, 13, 0), t(1, 16, 0)));

        let total = checker
            .daily_driving_time(driver, &day, Some(&candidate), None)
            .await
            .unwrap();
        assert_eq!(total, Duration::hours(7));

        // excluding the stored schedule counts only the candidate
        let total = checker
            .daily_driving_time(driver, &day, Some(&candidate), stored.id)
            .await
            .unwrap();
        assert_eq!(total, Duration::hours(3));
    }

    #[tokio::test]
    async fn test_availability_gate() {
        let repo = Arc::new(LocalRepository::new());
        let checker = checker(&repo);
        let driver = DriverId::new(1);

        // unknown driver: unavailable, not an error
        let window = w(t(1, 9, 0), t(1, 13, 0));
        assert!(!checker
            .check_driver_availability(driver, &window)
            .await
            .unwrap());

        repo.upsert_driver(&Driver {
            id: driver,
            name: "A. Ionescu".to_string(),
            available: true,
        })
        .await
        .unwrap();
        assert!(checker
            .check_driver_availability(driver, &window)
            .await
            .unwrap());

        // flag off
        repo.set_driver_available(driver, false).await.unwrap();
        assert!(!checker
            .check_driver_availability(driver, &window)
            .await
            .unwrap());

        // flag on but overlapping schedule
        repo.set_driver_available(driver, true).await.unwrap();
        repo.create_schedule(&Schedule::new(driver, w(t(1, 8, 0), t(1, 10, 0))))
            .await
            .unwrap();
        assert!(!checker
            .check_driver_availability(driver, &window)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_stricter_regime_changes_verdict() {
        let repo = Arc::new(LocalRepository::new());
        let driver = DriverId::new(1);

        repo.create_schedule(&Schedule::new(driver, w(t(1, 8, 0), t(1, 10, 0))))
            .await
            .unwrap();

        // default regime: 2 h driven + 2 h requested is fine
        let candidate = w(t(1, 10, 30), t(1, 12, 30));
        let lenient = checker(&repo);
        assert!(lenient
            .validate_continuous_driving(driver, &candidate, None)
            .await
            .unwrap());

        // a 3 h continuous limit flips the verdict without any global state
        let mut strict_rules = HosRules::default();
        strict_rules.required_break_after_hours = 3.0;
        let repo_dyn: Arc<dyn FleetRepository> = repo.clone();
        let strict = ComplianceChecker::new(repo_dyn, strict_rules);
        assert!(!strict
            .validate_continuous_driving(driver, &candidate, None)
            .await
            .unwrap());
    }
}
