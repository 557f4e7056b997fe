//! Progress Tracking
//!
//! Activity recording, course aggregation, sequential module gating and the
//! trainee dashboard rollup.

#![warn(missing_docs)]

pub mod tracker;
pub mod sequencer;
pub mod dashboard;

pub use tracker::{ProgressConfig, ProgressTracker, QuizOutcome};
pub use sequencer::{unlock_states, ModuleAccess, Sequencer};
pub use dashboard::{CourseOverview, CourseStats, DashboardData, DashboardService};
