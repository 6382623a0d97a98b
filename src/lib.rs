//! # Fleet HOS Engine
//!
//! Driver scheduling and hours-of-service compliance engine for freight
//! transport. This crate assigns driving time-windows to drivers while
//! enforcing hours-of-service regulations (daily driving cap, mandatory rest
//! periods, maximum continuous driving without a break) and supports
//! recurring schedules generated from a pattern, with per-instance
//! re-validation.
//!
//! ## Features
//!
//! - **Overlap Detection**: half-open `[start, end)` interval semantics per
//!   driver
//! - **Compliance Checking**: rest-period, continuous-driving, and
//!   daily-driving-time validation against configurable regulation constants
//! - **Recurring Schedules**: pattern expansion (daily/weekly/bi-weekly/
//!   monthly) with per-instance compliance flags
//! - **Compliance Reporting**: trailing-week summaries and next-required-rest
//!   computation for dispatch
//!
//! ## Architecture
//!
//! The crate is organized into several logical modules:
//!
//! - [`api`]: Public domain types (ids, schedules, rest periods, statuses)
//! - [`models`]: Time-interval algebra, regulation constants, JSON intake
//! - [`db`]: Repository pattern and the in-memory persistence backend
//! - [`services`]: Scheduler, compliance checker, recurrence generator, and
//!   compliance reporter
//! - [`error`]: The engine's rejection taxonomy
//!
//! ## Usage
//!
//! The engine is a library-level component, not a network service. Callers
//! construct a repository (or plug their own store in through the
//! [`db::repository::FleetRepository`] trait family), load a set of
//! [`models::rules::HosRules`], and drive the services:
//!
//! ```ignore
//! use std::sync::Arc;
//! use fleet_hos::db::RepositoryFactory;
//! use fleet_hos::models::rules::HosRules;
//! use fleet_hos::services::Scheduler;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = RepositoryFactory::create_local();
//! let scheduler = Scheduler::new(repo, HosRules::default());
//! # Ok(())
//! # }
//! ```
//!
//! Validation failures are reported, not retried: every rejection is an
//! ordinary negative result carrying a distinct, user-actionable reason.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
