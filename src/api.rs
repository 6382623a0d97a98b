//! Public API surface for the scheduling engine.
//!
//! This file consolidates the domain types shared across the repository and
//! service layers. All types derive Serialize/Deserialize for JSON
//! serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::models::window::TimeWindow;

/// Driver identifier (owned by the external fleet registry).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DriverId(pub i64);

/// Schedule identifier (repository primary key).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScheduleId(pub i64);

/// Rest period identifier (repository primary key).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RestPeriodId(pub i64);

/// Load identifier (owned by the external load board).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoadId(pub i64);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            pub fn new(value: i64) -> Self {
                $name(value)
            }

            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

impl_id!(DriverId);
impl_id!(ScheduleId);
impl_id!(RestPeriodId);
impl_id!(LoadId);

/// Lifecycle status of a schedule.
///
/// Operational transitions follow `Pending -> Accepted -> InProgress ->
/// Completed`, with `Cancelled` reachable from any non-terminal state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl ScheduleStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScheduleStatus::Completed | ScheduleStatus::Cancelled)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ScheduleStatus) -> bool {
        use ScheduleStatus::*;
        match (self, next) {
            (Pending, Accepted) => true,
            (Accepted, InProgress) => true,
            (InProgress, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Every status except `Cancelled`, in declaration order.
    ///
    /// Overlap and driving-time queries treat cancelled schedules as
    /// nonexistent; this is the filter they pass to the repository.
    pub fn non_cancelled() -> [ScheduleStatus; 4] {
        [
            ScheduleStatus::Pending,
            ScheduleStatus::Accepted,
            ScheduleStatus::InProgress,
            ScheduleStatus::Completed,
        ]
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Accepted => "accepted",
            ScheduleStatus::InProgress => "in_progress",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Classification of a recorded off-duty interval.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestType {
    ShortBreak,
    DailyRest,
    WeeklyRest,
}

impl std::fmt::Display for RestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RestType::ShortBreak => "short_break",
            RestType::DailyRest => "daily_rest",
            RestType::WeeklyRest => "weekly_rest",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle status of a rest period.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestStatus {
    Planned,
    Completed,
    Cancelled,
}

impl std::fmt::Display for RestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RestStatus::Planned => "planned",
            RestStatus::Completed => "completed",
            RestStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Status of a load as reported by the external load board.
///
/// Only the terminal-vs-active distinction matters to the engine: a schedule
/// carrying a non-terminal load cannot be deleted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Pending,
    Assigned,
    InTransit,
    Delivered,
    Cancelled,
}

impl LoadStatus {
    /// A load still on the road blocks schedule deletion.
    pub fn is_active(&self) -> bool {
        !matches!(self, LoadStatus::Delivered | LoadStatus::Cancelled)
    }
}

/// Step pattern for recurring schedule expansion.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
}

impl RecurrencePattern {
    /// Advance a cursor by one pattern step.
    ///
    /// Monthly stepping is calendar-aware (Jan 31 -> Feb 28/29); the other
    /// patterns are fixed-width.
    pub fn advance(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            RecurrencePattern::Daily => from + chrono::Duration::days(1),
            RecurrencePattern::Weekly => from + chrono::Duration::days(7),
            RecurrencePattern::BiWeekly => from + chrono::Duration::days(14),
            RecurrencePattern::Monthly => from
                .checked_add_months(chrono::Months::new(1))
                .unwrap_or(from + chrono::Duration::days(30)),
        }
    }
}

/// Recurrence metadata carried on a schedule record.
///
/// A series is a parent schedule owning an ordered sequence of instance
/// records; the repository maintains the parent -> instances index. An
/// instance with `modified = true` has been individually edited and is
/// excluded from bulk parent-driven updates.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Recurrence {
    /// The series owner.
    Parent {
        pattern: RecurrencePattern,
        until: DateTime<Utc>,
    },
    /// A generated child occurrence. The parent counts as occurrence 1, so
    /// generated instances number from 2.
    Instance {
        parent: ScheduleId,
        number: u32,
        modified: bool,
    },
}

/// A driver's assigned time-window of driving activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Repository-assigned on creation; `None` for an unsubmitted candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ScheduleId>,
    pub driver_id: DriverId,
    /// Half-open driving window `[start, end)`.
    pub window: TimeWindow,
    pub status: ScheduleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_id: Option<LoadId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    /// Telemetry, informational only; not used in compliance math.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_used_l: Option<f64>,
    /// Set by the recurrence generator when an instance fails re-validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_note: Option<String>,
}

impl Schedule {
    /// New pending candidate for a driver and window.
    pub fn new(driver_id: DriverId, window: TimeWindow) -> Self {
        Self {
            id: None,
            driver_id,
            window,
            status: ScheduleStatus::Pending,
            load_id: None,
            recurrence: None,
            distance_km: None,
            fuel_used_l: None,
            compliance_note: None,
        }
    }

    /// Attach a load reference.
    pub fn with_load(mut self, load: LoadId) -> Self {
        self.load_id = Some(load);
        self
    }

    /// Whether this schedule owns a recurring series.
    pub fn is_recurring_parent(&self) -> bool {
        matches!(self.recurrence, Some(Recurrence::Parent { .. }))
    }

    /// Parent id when this schedule is a generated instance.
    pub fn instance_of(&self) -> Option<ScheduleId> {
        match self.recurrence {
            Some(Recurrence::Instance { parent, .. }) => Some(parent),
            _ => None,
        }
    }

    /// Occurrence number within a series (parent = 1).
    pub fn instance_number(&self) -> Option<u32> {
        match self.recurrence {
            Some(Recurrence::Instance { number, .. }) => Some(number),
            Some(Recurrence::Parent { .. }) => Some(1),
            None => None,
        }
    }

    /// Whether this is an individually-edited instance.
    pub fn is_modified_instance(&self) -> bool {
        matches!(
            self.recurrence,
            Some(Recurrence::Instance { modified: true, .. })
        )
    }
}

/// A recorded interval during which a driver is off-duty.
///
/// Used read-only by the compliance checker as historical evidence. Immutable
/// once `Completed` except through the administrative correction operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestPeriod {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RestPeriodId>,
    pub driver_id: DriverId,
    pub window: TimeWindow,
    pub rest_type: RestType,
    pub status: RestStatus,
    /// Whether the rest satisfied its duration minimum when recorded.
    pub compliant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RestPeriod {
    /// New planned rest period for a driver.
    pub fn new(driver_id: DriverId, window: TimeWindow, rest_type: RestType) -> Self {
        Self {
            id: None,
            driver_id,
            window,
            rest_type,
            status: RestStatus::Planned,
            compliant: true,
            notes: None,
        }
    }
}

/// The slice of driver state the engine consumes.
///
/// Driver identity, licensing, and contact data live in the external fleet
/// registry; the engine only reads the availability flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub available: bool,
}

/// The slice of load state the engine consumes (deletion policy only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub id: LoadId,
    pub status: LoadStatus,
}

/// Summary of a driver's regulatory standing over the trailing week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceStatus {
    pub is_compliant: bool,
    /// Completed driving time within the trailing 7 days, in minutes.
    pub total_driving_minutes: i64,
    /// Completed rest time within the trailing 7 days, in minutes.
    pub total_rest_minutes: i64,
    /// Earliest instant by which the driver must next take a qualifying rest.
    pub next_required_rest: DateTime<Utc>,
    pub violations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
