//! Service layer for scheduling logic and orchestration.
//!
//! The services sit between callers (dispatch API, payroll readers) and the
//! repository traits. Each is constructed with an `Arc<dyn FleetRepository>`
//! and a [`crate::models::rules::HosRules`] value; none holds cross-call
//! mutable state beyond the per-driver lock registry.

pub mod compliance;

pub mod locks;

pub mod recurrence;

pub mod reporter;

pub mod scheduler;

pub use compliance::ComplianceChecker;
pub use locks::DriverLocks;
pub use recurrence::{RecurringScheduler, RecurringSeries, COMPLIANCE_WARNING};
pub use reporter::ComplianceReporter;
pub use scheduler::Scheduler;
