//! Schedule lifecycle orchestration.
//!
//! The scheduler runs every candidate through the validation pipeline
//! (interval sanity, overlap, daily cap, rest compliance, continuous
//! driving, short-circuiting on the first failure) and only commits on
//! all-pass.
//! Failures are reported, not retried; each maps to a distinct
//! [`ScheduleError`] so dispatch can tell the caller why.
//!
//! All mutating operations hold the driver's advisory lock for the whole
//! validate-then-write span (see [`super::locks`]).

use std::sync::Arc;

use log::{debug, info};

use crate::api::{
    Driver, DriverId, RestPeriod, RestPeriodId, RestStatus, RestType, Schedule, ScheduleId,
    ScheduleStatus, TimeWindow,
};
use crate::db::repository::{
    DriverRepository, FleetRepository, LoadRepository, RestPeriodRepository, ScheduleRepository,
};
use crate::error::{ScheduleError, ScheduleResult};
use crate::models::rules::HosRules;
use crate::services::compliance::ComplianceChecker;
use crate::services::locks::DriverLocks;

/// Orchestrates schedule creation, update, and cancellation.
pub struct Scheduler {
    repo: Arc<dyn FleetRepository>,
    checker: ComplianceChecker,
    rules: HosRules,
    locks: Arc<DriverLocks>,
}

impl Scheduler {
    pub fn new(repo: Arc<dyn FleetRepository>, rules: HosRules) -> Self {
        Self::with_locks(repo, rules, Arc::new(DriverLocks::new()))
    }

    /// Construct with a shared lock registry, so sibling services
    /// (recurrence generation) serialize against the same per-driver locks.
    pub fn with_locks(
        repo: Arc<dyn FleetRepository>,
        rules: HosRules,
        locks: Arc<DriverLocks>,
    ) -> Self {
        let checker = ComplianceChecker::new(repo.clone(), rules.clone());
        Self {
            repo,
            checker,
            rules,
            locks,
        }
    }

    pub fn checker(&self) -> &ComplianceChecker {
        &self.checker
    }

    pub fn rules(&self) -> &HosRules {
        &self.rules
    }

    pub(crate) fn repo(&self) -> &Arc<dyn FleetRepository> {
        &self.repo
    }

    pub(crate) fn locks(&self) -> &Arc<DriverLocks> {
        &self.locks
    }

    /// Validate and commit a schedule candidate.
    ///
    /// The candidate's id is ignored (the repository assigns one). Creation
    /// status is `Pending`, or `Accepted` when dispatch submits the candidate
    /// pre-accepted; any other inbound status is normalized to `Pending`.
    pub async fn create_schedule(&self, candidate: Schedule) -> ScheduleResult<Schedule> {
        let lock = self.locks.for_driver(candidate.driver_id);
        let _guard = lock.lock().await;

        let mut candidate = candidate;
        candidate.id = None;
        candidate.status = match candidate.status {
            ScheduleStatus::Accepted => ScheduleStatus::Accepted,
            _ => ScheduleStatus::Pending,
        };

        self.validate_candidate(&candidate, None).await?;

        let committed = self.repo.create_schedule(&candidate).await?;
        info!(
            "created schedule {:?} for driver {} over {}",
            committed.id, committed.driver_id, committed.window
        );
        Ok(committed)
    }

    /// Move a schedule to a new time window, re-validating against everything
    /// except the schedule's own prior self.
    ///
    /// A no-op when the window is unchanged: the pipeline only runs when the
    /// times actually move.
    pub async fn update_schedule(
        &self,
        id: ScheduleId,
        new_window: TimeWindow,
    ) -> ScheduleResult<Schedule> {
        // lock ordering: resolve the driver first, then re-read under the lock
        let existing = self.fetch_schedule(id).await?;
        let lock = self.locks.for_driver(existing.driver_id);
        let _guard = lock.lock().await;

        let existing = self.fetch_schedule(id).await?;
        if existing.window == new_window {
            debug!("schedule {} window unchanged, skipping validation", id);
            return Ok(existing);
        }

        let mut updated = existing;
        updated.window = new_window;
        self.validate_candidate(&updated, Some(id)).await?;

        self.repo.update_schedule(&updated).await?;
        info!("moved schedule {} to {}", id, updated.window);
        Ok(updated)
    }

    /// Apply an operational status transition.
    ///
    /// Valid execution-tracking transitions are `Pending -> Accepted ->
    /// InProgress -> Completed`, with cancellation allowed from any
    /// non-terminal state. Cancelling an already-cancelled schedule is an
    /// idempotent no-op.
    pub async fn transition_status(
        &self,
        id: ScheduleId,
        next: ScheduleStatus,
    ) -> ScheduleResult<Schedule> {
        let existing = self.fetch_schedule(id).await?;
        let lock = self.locks.for_driver(existing.driver_id);
        let _guard = lock.lock().await;

        let existing = self.fetch_schedule(id).await?;
        if existing.status == ScheduleStatus::Cancelled && next == ScheduleStatus::Cancelled {
            return Ok(existing);
        }
        if !existing.status.can_transition_to(next) {
            return Err(ScheduleError::InvalidStatusTransition {
                from: existing.status.to_string(),
                to: next.to_string(),
            });
        }

        let mut updated = existing;
        updated.status = next;
        self.repo.update_schedule(&updated).await?;
        debug!("schedule {} is now {}", id, next);
        Ok(updated)
    }

    /// Cancel a schedule.
    ///
    /// Hard deletion is not exposed here: cancellation preserves audit
    /// history. Refused with [`ScheduleError::ActiveLoadConflict`] while an
    /// attached load is neither delivered nor cancelled. Cancelling an
    /// already-cancelled schedule succeeds without effect.
    pub async fn delete_schedule(&self, id: ScheduleId) -> ScheduleResult<()> {
        let existing = self.fetch_schedule(id).await?;
        let lock = self.locks.for_driver(existing.driver_id);
        let _guard = lock.lock().await;

        let existing = self.fetch_schedule(id).await?;
        if existing.status == ScheduleStatus::Cancelled {
            return Ok(());
        }

        if let Some(load_id) = existing.load_id {
            let load = self
                .repo
                .get_load(load_id)
                .await
                .map_err(|e| ScheduleError::from_lookup(e, format!("load {}", load_id)))?;
            if load.status.is_active() {
                return Err(ScheduleError::ActiveLoadConflict {
                    schedule: id,
                    load: load_id,
                });
            }
        }

        let mut updated = existing;
        updated.status = ScheduleStatus::Cancelled;
        self.repo.update_schedule(&updated).await?;
        info!("cancelled schedule {}", id);
        Ok(())
    }

    /// Drivers that could legally take the given window, for dispatch
    /// matching.
    pub async fn find_available_drivers(&self, window: TimeWindow) -> ScheduleResult<Vec<Driver>> {
        if !window.is_valid() {
            return Err(ScheduleError::InvalidInterval {
                start: window.start,
                end: window.end,
            });
        }

        let mut compliant = Vec::new();
        for driver in self
            .repo
            .list_drivers()
            .await?
            .into_iter()
            .filter(|d| d.available)
        {
            if self
                .checker
                .check_driver_availability(driver.id, &window)
                .await?
            {
                compliant.push(driver);
            }
        }
        Ok(compliant)
    }

    // ==================== Rest-period lifecycle ====================

    /// Record a planned rest period.
    ///
    /// Duration minimums are enforced at recording time so the stored history
    /// never contains an undersized daily/weekly rest or short break.
    pub async fn record_rest_period(&self, candidate: RestPeriod) -> ScheduleResult<RestPeriod> {
        let lock = self.locks.for_driver(candidate.driver_id);
        let _guard = lock.lock().await;

        if !candidate.window.is_valid() {
            return Err(ScheduleError::InvalidInterval {
                start: candidate.window.start,
                end: candidate.window.end,
            });
        }
        self.check_rest_duration(&candidate)?;

        let mut candidate = candidate;
        candidate.id = None;
        candidate.compliant = true;

        let committed = self.repo.create_rest_period(&candidate).await?;
        info!(
            "recorded {} rest {:?} for driver {} over {}",
            committed.rest_type, committed.id, committed.driver_id, committed.window
        );
        Ok(committed)
    }

    /// Mark a planned rest as completed, making it evidence for compliance
    /// checks.
    pub async fn complete_rest_period(&self, id: RestPeriodId) -> ScheduleResult<RestPeriod> {
        let existing = self.fetch_rest(id).await?;
        let lock = self.locks.for_driver(existing.driver_id);
        let _guard = lock.lock().await;

        let existing = self.fetch_rest(id).await?;
        match existing.status {
            RestStatus::Completed => Ok(existing),
            RestStatus::Cancelled => Err(ScheduleError::InvalidStatusTransition {
                from: existing.status.to_string(),
                to: RestStatus::Completed.to_string(),
            }),
            RestStatus::Planned => {
                let mut updated = existing;
                updated.status = RestStatus::Completed;
                self.repo.update_rest_period(&updated).await?;
                Ok(updated)
            }
        }
    }

    /// Cancel a planned rest. Completed rests are immutable here; cancelling
    /// an already-cancelled rest is an idempotent no-op.
    pub async fn cancel_rest_period(&self, id: RestPeriodId) -> ScheduleResult<RestPeriod> {
        let existing = self.fetch_rest(id).await?;
        let lock = self.locks.for_driver(existing.driver_id);
        let _guard = lock.lock().await;

        let existing = self.fetch_rest(id).await?;
        match existing.status {
            RestStatus::Cancelled => Ok(existing),
            RestStatus::Completed => Err(ScheduleError::InvalidStatusTransition {
                from: existing.status.to_string(),
                to: RestStatus::Cancelled.to_string(),
            }),
            RestStatus::Planned => {
                let mut updated = existing;
                updated.status = RestStatus::Cancelled;
                self.repo.update_rest_period(&updated).await?;
                Ok(updated)
            }
        }
    }

    /// Administrative correction of a completed rest period.
    ///
    /// The only sanctioned mutation of completed history: fixes a
    /// mis-recorded window or annotates the record. The corrected window
    /// still has to satisfy the duration minimum for its type.
    pub async fn correct_rest_period(
        &self,
        id: RestPeriodId,
        new_window: Option<TimeWindow>,
        notes: Option<String>,
    ) -> ScheduleResult<RestPeriod> {
        let existing = self.fetch_rest(id).await?;
        let lock = self.locks.for_driver(existing.driver_id);
        let _guard = lock.lock().await;

        let mut updated = self.fetch_rest(id).await?;
        if let Some(window) = new_window {
            if !window.is_valid() {
                return Err(ScheduleError::InvalidInterval {
                    start: window.start,
                    end: window.end,
                });
            }
            updated.window = window;
            self.check_rest_duration(&updated)?;
        }
        if let Some(notes) = notes {
            updated.notes = Some(notes);
        }
        self.repo.update_rest_period(&updated).await?;
        info!("corrected rest period {}", id);
        Ok(updated)
    }

    // ==================== Validation pipeline ====================

    /// The shared validation pipeline: overlap, then daily cap for every
    /// calendar day the candidate touches, then rest compliance, then
    /// continuous driving. Short-circuits on the first failure. `exclude`
    /// keeps a schedule from being compared against its own prior self
    /// during updates.
    pub(crate) async fn validate_candidate(
        &self,
        candidate: &Schedule,
        exclude: Option<ScheduleId>,
    ) -> ScheduleResult<()> {
        if !candidate.window.is_valid() {
            return Err(ScheduleError::InvalidInterval {
                start: candidate.window.start,
                end: candidate.window.end,
            });
        }

        let driver = candidate.driver_id;
        let statuses = ScheduleStatus::non_cancelled();
        let overlapping = self
            .repo
            .schedules_for_driver(driver, Some(candidate.window), Some(&statuses))
            .await?;
        if let Some(conflict) = overlapping
            .into_iter()
            .find(|s| exclude.map_or(true, |e| s.id != Some(e)))
        {
            debug!(
                "rejecting window {} for driver {}: overlaps {:?}",
                candidate.window, driver, conflict.id
            );
            return Err(ScheduleError::Overlap {
                driver,
                conflicting: conflict.id,
            });
        }

        let cap = self.rules.max_daily_driving();
        for day in candidate.window.calendar_days() {
            let total = self
                .checker
                .daily_driving_time(driver, &day, Some(candidate), exclude)
                .await?;
            if total > cap {
                return Err(ScheduleError::DailyLimitExceeded {
                    day: day.start.date_naive(),
                    driven_minutes: total.num_minutes(),
                    cap_minutes: cap.num_minutes(),
                });
            }
        }

        if !self
            .checker
            .validate_rest_compliance(driver, &candidate.window)
            .await?
        {
            return Err(ScheduleError::RestViolation(format!(
                "driver {} has no qualifying rest before {}",
                driver, candidate.window.start
            )));
        }

        if !self
            .checker
            .validate_continuous_driving(driver, &candidate.window, exclude)
            .await?
        {
            return Err(ScheduleError::ContinuousDrivingViolation(format!(
                "driver {} would drive more than {} minutes without a qualifying break",
                driver,
                self.rules.required_break_after().num_minutes()
            )));
        }

        Ok(())
    }

    fn check_rest_duration(&self, rest: &RestPeriod) -> ScheduleResult<()> {
        let duration = rest.window.duration();
        let minimum = match rest.rest_type {
            RestType::ShortBreak => self.rules.minimum_break(),
            RestType::DailyRest | RestType::WeeklyRest => self.rules.minimum_rest(),
        };
        if duration < minimum {
            return Err(ScheduleError::RestViolation(format!(
                "{} of {} minutes is below the {} minute minimum",
                rest.rest_type,
                duration.num_minutes(),
                minimum.num_minutes()
            )));
        }
        Ok(())
    }

    async fn fetch_schedule(&self, id: ScheduleId) -> ScheduleResult<Schedule> {
        self.repo
            .get_schedule(id)
            .await
            .map_err(|e| ScheduleError::from_lookup(e, format!("schedule {}", id)))
    }

    async fn fetch_rest(&self, id: RestPeriodId) -> ScheduleResult<RestPeriod> {
        self.repo
            .get_rest_period(id)
            .await
            .map_err(|e| ScheduleError::from_lookup(e, format!("rest period {}", id)))
    }
}
