//! Traintrack core data models.
//!
//! This crate defines the data structures shared by the progress engine:
//! identities, catalog entities, progress records, leaderboard standings and
//! the canonical status state machine.

#![warn(missing_docs)]

// Core identities
mod id;

// People
mod user;

// Catalog
mod catalog;

// Progress tracking
mod status;
mod progress;
mod quiz;

// Leaderboards
mod leaderboard;

// Errors
mod error;

// Re-exports
pub use id::*;

pub use user::{Role, Team, User};

pub use catalog::{Course, CourseStatus, Module, ModuleKind};

pub use status::ProgressStatus;
pub use progress::{completion_percentage, CourseProgress, ModuleProgress};
pub use quiz::QuizResult;

pub use leaderboard::{dense_ranks, LeaderboardScope, TeamStanding, UserStanding};

pub use error::TrackError;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
