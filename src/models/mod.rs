//! Core data modeling: interval algebra, regulation constants, JSON intake.

pub mod rules;
pub mod schedule;
pub mod window;

pub use rules::HosRules;
pub use window::TimeWindow;
