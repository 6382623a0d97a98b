//! Recurring schedule expansion and maintenance.
//!
//! A recurring series is one parent schedule owning an ordered sequence of
//! instance records; the parent's pattern and end date drive expansion, and
//! each generated instance is independently re-validated against rest and
//! continuous-driving rules before being persisted.
//!
//! Non-compliant instances are retained and flagged, never silently dropped:
//! a dropped instance would hide a scheduling gap from the dispatcher. A
//! flagged instance is reset to `Pending` and carries
//! [`COMPLIANCE_WARNING`] in its compliance note.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::api::{
    Recurrence, RecurrencePattern, Schedule, ScheduleId, ScheduleStatus, TimeWindow,
};
use crate::db::repository::{FleetRepository, LoadRepository, ScheduleRepository};
use crate::error::{ScheduleError, ScheduleResult};
use crate::models::rules::HosRules;
use crate::services::locks::DriverLocks;
use crate::services::scheduler::Scheduler;

/// Note attached to an instance that failed re-validation.
pub const COMPLIANCE_WARNING: &str = "[WARNING: Compliance check needed]";

/// A committed recurring series: the parent plus its generated instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringSeries {
    pub parent: Schedule,
    pub instances: Vec<Schedule>,
}

impl RecurringSeries {
    /// Total occurrence count, parent included.
    pub fn occurrences(&self) -> usize {
        1 + self.instances.len()
    }

    /// Instances that failed re-validation and carry the warning flag.
    pub fn flagged(&self) -> impl Iterator<Item = &Schedule> {
        self.instances
            .iter()
            .filter(|i| i.compliance_note.as_deref() == Some(COMPLIANCE_WARNING))
    }
}

/// Expands and maintains recurring schedule series.
pub struct RecurringScheduler {
    scheduler: Scheduler,
}

impl RecurringScheduler {
    pub fn new(repo: Arc<dyn FleetRepository>, rules: HosRules) -> Self {
        Self {
            scheduler: Scheduler::new(repo, rules),
        }
    }

    /// Construct sharing another scheduler's per-driver locks, so recurring
    /// and one-off mutations for the same driver serialize against each
    /// other.
    pub fn sharing(scheduler: &Scheduler) -> Self {
        Self {
            scheduler: Scheduler::with_locks(
                scheduler.repo().clone(),
                scheduler.rules().clone(),
                scheduler.locks().clone(),
            ),
        }
    }

    fn repo(&self) -> &Arc<dyn FleetRepository> {
        self.scheduler.repo()
    }

    fn locks(&self) -> &Arc<DriverLocks> {
        self.scheduler.locks()
    }

    /// Validate and persist a recurring parent, then expand its series.
    ///
    /// The cursor starts one pattern step after the parent's own start and
    /// advances while it stays strictly before `until`; each instance keeps
    /// the parent's duration. `max_occurrences` caps the whole series with
    /// the parent counted as occurrence one. Every generated instance runs
    /// rest and continuous-driving validation; failures are flagged, not
    /// dropped.
    pub async fn create_recurring_schedule(
        &self,
        parent: Schedule,
        pattern: RecurrencePattern,
        until: DateTime<Utc>,
        max_occurrences: Option<u32>,
    ) -> ScheduleResult<RecurringSeries> {
        let lock = self.locks().for_driver(parent.driver_id);
        let _guard = lock.lock().await;

        let mut parent = parent;
        parent.id = None;
        parent.status = match parent.status {
            ScheduleStatus::Accepted => ScheduleStatus::Accepted,
            _ => ScheduleStatus::Pending,
        };
        parent.recurrence = Some(Recurrence::Parent { pattern, until });

        self.scheduler.validate_candidate(&parent, None).await?;
        let parent = self.repo().create_schedule(&parent).await?;
        let parent_id = parent.id.ok_or_else(|| {
            ScheduleError::Repository(crate::db::repository::RepositoryError::internal(
                "repository returned a schedule without an id",
            ))
        })?;

        let duration = parent.window.duration();
        let cap = max_occurrences.unwrap_or(u32::MAX);
        let checker = self.scheduler.checker();

        let mut instances = Vec::new();
        let mut cursor = pattern.advance(parent.window.start);
        let mut occurrences: u32 = 1;
        let mut number: u32 = 2;

        while cursor < until && occurrences < cap {
            let window = TimeWindow {
                start: cursor,
                end: cursor + duration,
            };

            let mut instance = Schedule::new(parent.driver_id, window);
            instance.status = parent.status;
            instance.recurrence = Some(Recurrence::Instance {
                parent: parent_id,
                number,
                modified: false,
            });

            let rest_ok = checker
                .validate_rest_compliance(parent.driver_id, &window)
                .await?;
            let continuous_ok = checker
                .validate_continuous_driving(parent.driver_id, &window, None)
                .await?;
            if !(rest_ok && continuous_ok) {
                instance.status = ScheduleStatus::Pending;
                instance.compliance_note = Some(COMPLIANCE_WARNING.to_string());
                warn!(
                    "recurring instance {} of schedule {} at {} failed compliance, flagged",
                    number, parent_id, window
                );
            }

            instances.push(self.repo().create_schedule(&instance).await?);
            occurrences += 1;
            number += 1;
            cursor = pattern.advance(cursor);
        }

        info!(
            "created recurring schedule {} with {} generated instances",
            parent_id,
            instances.len()
        );
        Ok(RecurringSeries { parent, instances })
    }

    /// Move a recurring parent, optionally shifting every
    /// non-individually-modified instance by the same offset.
    ///
    /// The parent edit goes through the full validation pipeline. Shifted
    /// instances are re-validated against rest and continuous-driving rules
    /// and flagged rather than rejected when non-compliant, preserving the
    /// series shape for the dispatcher to review.
    pub async fn update_recurring_schedule(
        &self,
        id: ScheduleId,
        new_window: TimeWindow,
        apply_to_all_instances: bool,
    ) -> ScheduleResult<Schedule> {
        let parent = self.fetch_parent(id).await?;
        let lock = self.locks().for_driver(parent.driver_id);
        let _guard = lock.lock().await;

        let parent = self.fetch_parent(id).await?;
        let offset = new_window.start - parent.window.start;

        let mut updated_parent = parent.clone();
        updated_parent.window = new_window;
        if parent.window != new_window {
            self.scheduler
                .validate_candidate(&updated_parent, Some(id))
                .await?;
            self.repo().update_schedule(&updated_parent).await?;
        }

        if apply_to_all_instances {
            let checker = self.scheduler.checker();
            for instance in self.repo().instances_of(id).await? {
                if instance.is_modified_instance()
                    || instance.status == ScheduleStatus::Cancelled
                {
                    continue;
                }

                let mut shifted = instance.clone();
                shifted.window = instance.window.shifted_by(offset);

                let rest_ok = checker
                    .validate_rest_compliance(shifted.driver_id, &shifted.window)
                    .await?;
                let continuous_ok = checker
                    .validate_continuous_driving(shifted.driver_id, &shifted.window, shifted.id)
                    .await?;
                if rest_ok && continuous_ok {
                    shifted.compliance_note = None;
                } else {
                    shifted.status = ScheduleStatus::Pending;
                    shifted.compliance_note = Some(COMPLIANCE_WARNING.to_string());
                    warn!(
                        "shifted instance {:?} of schedule {} failed compliance, flagged",
                        shifted.id, id
                    );
                }
                self.repo().update_schedule(&shifted).await?;
            }
        }

        Ok(updated_parent)
    }

    /// Individually edit one instance.
    ///
    /// Runs the full validation pipeline (rejecting on failure, like any
    /// one-off edit) and marks the instance as locally modified, excluding it
    /// from future bulk parent-driven updates.
    pub async fn update_instance(
        &self,
        id: ScheduleId,
        new_window: TimeWindow,
    ) -> ScheduleResult<Schedule> {
        let instance = self.fetch_instance(id).await?;
        let lock = self.locks().for_driver(instance.driver_id);
        let _guard = lock.lock().await;

        let instance = self.fetch_instance(id).await?;
        let mut updated = instance;
        updated.window = new_window;
        if let Some(Recurrence::Instance {
            parent, number, ..
        }) = updated.recurrence
        {
            updated.recurrence = Some(Recurrence::Instance {
                parent,
                number,
                modified: true,
            });
        }

        self.scheduler.validate_candidate(&updated, Some(id)).await?;
        updated.compliance_note = None;
        self.repo().update_schedule(&updated).await?;
        Ok(updated)
    }

    /// Wind down a recurring series.
    ///
    /// With `delete_all_instances`, every instance starting after `as_of` is
    /// cancelled (or physically removed when it carries no active load) and
    /// the parent follows the same policy. Without it, only the parent is
    /// cancelled when instances remain on record, or removed when none do.
    /// Past instances are always retained for audit.
    pub async fn delete_recurring_schedule(
        &self,
        id: ScheduleId,
        delete_all_instances: bool,
        as_of: DateTime<Utc>,
    ) -> ScheduleResult<()> {
        let parent = self.fetch_parent(id).await?;
        let lock = self.locks().for_driver(parent.driver_id);
        let _guard = lock.lock().await;

        let parent = self.fetch_parent(id).await?;
        let instances = self.repo().instances_of(id).await?;

        if delete_all_instances {
            let mut remaining = 0usize;
            for instance in &instances {
                if instance.window.start <= as_of {
                    remaining += 1;
                    continue;
                }
                if self.cancel_or_remove(instance).await? {
                    remaining += 1;
                }
            }

            if remaining > 0 {
                self.cancel_schedule(&parent).await?;
            } else {
                self.cancel_or_remove(&parent).await?;
            }
            info!(
                "deleted recurring schedule {} and its future instances",
                id
            );
        } else if !instances.is_empty() {
            self.cancel_schedule(&parent).await?;
        } else {
            self.cancel_or_remove(&parent).await?;
        }

        Ok(())
    }

    /// Cancel a schedule, or hard-delete it when no active load is attached.
    /// Returns whether a record remains.
    async fn cancel_or_remove(&self, schedule: &Schedule) -> ScheduleResult<bool> {
        if self.load_is_active(schedule).await? {
            self.cancel_schedule(schedule).await?;
            Ok(true)
        } else {
            let Some(id) = schedule.id else {
                return Ok(false);
            };
            self.repo().delete_schedule(id).await?;
            Ok(false)
        }
    }

    async fn cancel_schedule(&self, schedule: &Schedule) -> ScheduleResult<()> {
        if schedule.status == ScheduleStatus::Cancelled {
            return Ok(());
        }
        let mut cancelled = schedule.clone();
        cancelled.status = ScheduleStatus::Cancelled;
        self.repo().update_schedule(&cancelled).await?;
        Ok(())
    }

    async fn load_is_active(&self, schedule: &Schedule) -> ScheduleResult<bool> {
        let Some(load_id) = schedule.load_id else {
            return Ok(false);
        };
        let load = self
            .repo()
            .get_load(load_id)
            .await
            .map_err(|e| ScheduleError::from_lookup(e, format!("load {}", load_id)))?;
        Ok(load.status.is_active())
    }

    async fn fetch_parent(&self, id: ScheduleId) -> ScheduleResult<Schedule> {
        let schedule = self
            .repo()
            .get_schedule(id)
            .await
            .map_err(|e| ScheduleError::from_lookup(e, format!("schedule {}", id)))?;
        if !schedule.is_recurring_parent() {
            return Err(ScheduleError::NotFound(format!(
                "recurring schedule {}",
                id
            )));
        }
        Ok(schedule)
    }

    async fn fetch_instance(&self, id: ScheduleId) -> ScheduleResult<Schedule> {
        let schedule = self
            .repo()
            .get_schedule(id)
            .await
            .map_err(|e| ScheduleError::from_lookup(e, format!("schedule {}", id)))?;
        if schedule.instance_of().is_none() {
            return Err(ScheduleError::NotFound(format!(
                "recurring instance {}",
                id
            )));
        }
        Ok(schedule)
    }
}
