//! Multi-trial measurement engine.
//!
//! `scheduler` fans out over URLs with bounded concurrency, `coordinator`
//! runs the repeated trials for one URL, and `stats` holds the robust
//! statistics both rely on.

pub mod coordinator;
pub mod scheduler;
pub mod stats;

pub use scheduler::{MeasurePlan, Scheduler};
