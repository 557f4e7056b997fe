//! Screentime Analytics
//!
//! Read-only time metrics over progress rows: per-module and per-course
//! screentime, all-course rollups and windowed daily activity.

#![warn(missing_docs)]

pub mod screentime;

pub use screentime::{
    efficiency_percentage, format_minutes, ActivityAnalytics, CourseScreentime, CourseTimeSummary,
    ModuleScreentime, ScreentimeService, TotalScreentime,
};
