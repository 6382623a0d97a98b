//! Persistence layer for schedule and rest-period data.
//!
//! This module provides abstractions for storage via the Repository pattern,
//! allowing different backends to be swapped without touching the engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application Layer (dispatch API, payroll readers, …)   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Service Layer (services::*) - Scheduling Logic          │
//! │  - Overlap and compliance validation                     │
//! │  - Recurrence expansion                                  │
//! │  - Compliance reporting                                  │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository Traits (repository/) - Abstract Interface   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌──────────────────────────────────────────────┐
//!     │             Local Repository                  │
//!     │               (in-memory)                     │
//!     └──────────────────────────────────────────────┘
//! ```
//!
//! The module includes:
//! - `repository`: Trait definitions for storage operations
//! - `repositories::local`: In-memory implementation for unit testing and
//!   local development
//! - `factory`: Factory and builder for creating repository instances
//! - `repo_config`: `repository.toml` support
//!
//! # Recommended Usage
//!
//! ```ignore
//! use fleet_hos::db::RepositoryFactory;
//! use fleet_hos::models::rules::HosRules;
//! use fleet_hos::services::Scheduler;
//!
//! let repo = RepositoryFactory::from_default_config()?;
//! let scheduler = Scheduler::new(repo, HosRules::default());
//! ```
//!
//! Production stores implement the traits in [`repository`] outside this
//! crate; the engine treats persistence failures as opaque and propagates
//! them unmodified.

#[cfg(not(feature = "local-repo"))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod models;
pub mod repo_config;
pub mod repositories;
pub mod repository;

pub use models::RepositoryCounts;
pub use repo_config::RepositoryConfig;

// Repository trait family and implementations
pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
#[cfg(feature = "local-repo")]
pub use repositories::LocalRepository;
pub use repository::{
    DriverRepository, ErrorContext, FleetRepository, LoadRepository, RepositoryError,
    RepositoryResult, RestPeriodRepository, ScheduleRepository,
};
