//! Screentime metrics.
//!
//! Read-only derivations over progress rows: formatted durations, efficiency
//! against estimates, and windowed daily activity. Nothing here writes.

use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::{Datelike, Duration, Utc};
use serde::Serialize;
use tracing::warn;
use traintrack_core::{CourseId, ModuleId, Time, TrackError, UserId};
use traintrack_storage::Storage;

/// Format minutes as "XhYm".
pub fn format_minutes(minutes: u32) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Actual time against estimate as a capped percentage.
///
/// 0 when there is no estimate; spending longer than the estimate caps at
/// 100 rather than rewarding slow runs with large numbers.
pub fn efficiency_percentage(actual_minutes: u32, estimated_minutes: u32) -> u8 {
    if estimated_minutes == 0 {
        return 0;
    }
    let percent = (100.0 * actual_minutes as f64 / estimated_minutes as f64).round();
    percent.min(100.0) as u8
}

/// UTC calendar date bucket, "YYYY-MM-DD".
fn day_bucket(at: Time) -> String {
    format!("{:04}-{:02}-{:02}", at.year(), at.month(), at.day())
}

/// Screentime for one module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleScreentime {
    /// The module
    pub module_id: ModuleId,
    /// Module title
    pub module_title: String,
    /// Accumulated time
    pub time_spent_minutes: u32,
    /// "XhYm"
    pub time_spent_formatted: String,
    /// Accumulated time in hours, two decimals
    pub time_spent_hours: f64,
    /// Authored estimate
    pub estimated_duration_minutes: u32,
    /// "XhYm"
    pub estimated_duration_formatted: String,
    /// Capped actual-vs-estimate percentage
    pub efficiency_percentage: u8,
}

/// Screentime for one course with its per-module breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct CourseScreentime {
    /// The course
    pub course_id: CourseId,
    /// Course title
    pub course_title: String,
    /// Sum of module time
    pub total_time_spent_minutes: u32,
    /// "XhYm"
    pub total_time_spent_formatted: String,
    /// Sum of module time in hours, two decimals
    pub total_time_spent_hours: f64,
    /// Sum of module estimates
    pub estimated_course_duration_minutes: u32,
    /// "XhYm"
    pub estimated_course_duration_formatted: String,
    /// Capped actual-vs-estimate percentage
    pub efficiency_percentage: u8,
    /// Per-module screentime in sequence order
    pub module_breakdown: Vec<ModuleScreentime>,
    /// Modules with any recorded time
    pub modules_with_activity: u32,
    /// Module count
    pub total_modules: u32,
}

/// One course's line in the all-course rollup.
#[derive(Debug, Clone, Serialize)]
pub struct CourseTimeSummary {
    /// The course
    pub course_id: CourseId,
    /// Course title
    pub course_title: String,
    /// Accumulated time
    pub time_spent_minutes: u32,
    /// Accumulated time in hours, two decimals
    pub time_spent_hours: f64,
    /// Capped actual-vs-estimate percentage
    pub efficiency_percentage: u8,
}

/// A user's screentime across every course.
#[derive(Debug, Clone, Serialize)]
pub struct TotalScreentime {
    /// Sum across courses
    pub total_minutes: u32,
    /// "XhYm"
    pub total_formatted: String,
    /// Sum across courses in hours, two decimals
    pub total_hours: f64,
    /// Mean time per started course, hours
    pub average_per_course_hours: f64,
    /// Courses with a progress row
    pub courses_count: u32,
    /// Per-course rollup, most time first
    pub courses: Vec<CourseTimeSummary>,
}

/// Windowed activity metrics.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityAnalytics {
    /// Window length, days
    pub period_days: u32,
    /// Minutes recorded inside the window
    pub total_minutes: u32,
    /// "XhYm"
    pub total_formatted: String,
    /// Days with any activity
    pub days_active: u32,
    /// Mean minutes per active day
    pub average_per_active_day_minutes: f64,
    /// Minutes per UTC calendar date
    pub daily_breakdown: BTreeMap<String, u32>,
}

/// Screentime read service.
pub struct ScreentimeService<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> ScreentimeService<S> {
    /// Create a new screentime service.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Time spent by a user on one module.
    pub async fn module_screentime(
        &self,
        user_id: UserId,
        module_id: ModuleId,
    ) -> Result<ModuleScreentime, TrackError> {
        let module = self
            .storage
            .load_module(module_id)
            .await?
            .ok_or_else(|| TrackError::not_found("module", module_id))?;
        self.ensure_user(user_id).await?;

        let minutes = self
            .storage
            .load_module_progress(user_id, module_id)
            .await?
            .map(|p| p.time_spent_minutes)
            .unwrap_or(0);

        Ok(Self::module_entry(
            module.id,
            module.title,
            minutes,
            module.estimated_duration_minutes,
        ))
    }

    /// Time spent by a user on one course, with a per-module breakdown.
    pub async fn course_screentime(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseScreentime, TrackError> {
        let course = self
            .storage
            .load_course(course_id)
            .await?
            .ok_or_else(|| TrackError::not_found("course", course_id))?;
        self.ensure_user(user_id).await?;

        let modules = self.storage.list_modules(course_id).await?;
        let rows = self.storage.list_module_progress(user_id, course_id).await?;
        let minutes_by_module: BTreeMap<ModuleId, u32> = rows
            .iter()
            .map(|p| (p.module_id, p.time_spent_minutes))
            .collect();

        let module_breakdown: Vec<ModuleScreentime> = modules
            .into_iter()
            .map(|module| {
                let minutes = minutes_by_module.get(&module.id).copied().unwrap_or(0);
                Self::module_entry(
                    module.id,
                    module.title,
                    minutes,
                    module.estimated_duration_minutes,
                )
            })
            .collect();

        let total_minutes: u32 = module_breakdown.iter().map(|m| m.time_spent_minutes).sum();
        let estimated_total: u32 = module_breakdown
            .iter()
            .map(|m| m.estimated_duration_minutes)
            .sum();
        let modules_with_activity = module_breakdown
            .iter()
            .filter(|m| m.time_spent_minutes > 0)
            .count() as u32;

        Ok(CourseScreentime {
            course_id,
            course_title: course.title,
            total_time_spent_minutes: total_minutes,
            total_time_spent_formatted: format_minutes(total_minutes),
            total_time_spent_hours: hours(total_minutes),
            estimated_course_duration_minutes: estimated_total,
            estimated_course_duration_formatted: format_minutes(estimated_total),
            efficiency_percentage: efficiency_percentage(total_minutes, estimated_total),
            total_modules: module_breakdown.len() as u32,
            module_breakdown,
            modules_with_activity,
        })
    }

    /// A user's screentime across every course they have touched.
    pub async fn total_screentime(&self, user_id: UserId) -> Result<TotalScreentime, TrackError> {
        self.ensure_user(user_id).await?;

        let progress = self.storage.list_course_progress_for_user(user_id).await?;

        let mut courses = Vec::new();
        for row in &progress {
            let Some(course) = self.storage.load_course(row.course_id).await? else {
                warn!(course = %row.course_id, "progress row for a course missing from the catalog");
                continue;
            };
            let estimated: u32 = self
                .storage
                .list_modules(row.course_id)
                .await?
                .iter()
                .map(|m| m.estimated_duration_minutes)
                .sum();
            courses.push(CourseTimeSummary {
                course_id: row.course_id,
                course_title: course.title,
                time_spent_minutes: row.time_spent_minutes,
                time_spent_hours: hours(row.time_spent_minutes),
                efficiency_percentage: efficiency_percentage(row.time_spent_minutes, estimated),
            });
        }
        courses.sort_by(|a, b| {
            b.time_spent_minutes
                .cmp(&a.time_spent_minutes)
                .then_with(|| a.course_id.cmp(&b.course_id))
        });

        let total_minutes: u32 = courses.iter().map(|c| c.time_spent_minutes).sum();
        let courses_count = courses.len() as u32;
        let average_per_course_hours = if courses_count == 0 {
            0.0
        } else {
            hours(total_minutes) / courses_count as f64
        };

        Ok(TotalScreentime {
            total_minutes,
            total_formatted: format_minutes(total_minutes),
            total_hours: hours(total_minutes),
            average_per_course_hours,
            courses_count,
            courses,
        })
    }

    /// Activity inside the trailing window, bucketed by UTC calendar date of
    /// each row's last update.
    pub async fn activity(
        &self,
        user_id: UserId,
        window_days: u32,
    ) -> Result<ActivityAnalytics, TrackError> {
        self.ensure_user(user_id).await?;

        let cutoff = Utc::now() - Duration::days(window_days as i64);
        let rows = self.storage.list_module_progress_for_user(user_id).await?;

        let mut total_minutes = 0u32;
        let mut daily_breakdown: BTreeMap<String, u32> = BTreeMap::new();
        for row in rows {
            if row.updated_at < cutoff || row.time_spent_minutes == 0 {
                continue;
            }
            total_minutes += row.time_spent_minutes;
            *daily_breakdown.entry(day_bucket(row.updated_at)).or_insert(0) +=
                row.time_spent_minutes;
        }

        let days_active = daily_breakdown.len() as u32;
        let average_per_active_day_minutes = if days_active == 0 {
            0.0
        } else {
            total_minutes as f64 / days_active as f64
        };

        Ok(ActivityAnalytics {
            period_days: window_days,
            total_minutes,
            total_formatted: format_minutes(total_minutes),
            days_active,
            average_per_active_day_minutes,
            daily_breakdown,
        })
    }

    fn module_entry(
        module_id: ModuleId,
        title: String,
        minutes: u32,
        estimated: u32,
    ) -> ModuleScreentime {
        ModuleScreentime {
            module_id,
            module_title: title,
            time_spent_minutes: minutes,
            time_spent_formatted: format_minutes(minutes),
            time_spent_hours: hours(minutes),
            estimated_duration_minutes: estimated,
            estimated_duration_formatted: format_minutes(estimated),
            efficiency_percentage: efficiency_percentage(minutes, estimated),
        }
    }

    async fn ensure_user(&self, user_id: UserId) -> Result<(), TrackError> {
        self.storage
            .load_user(user_id)
            .await?
            .ok_or_else(|| TrackError::not_found("user", user_id))?;
        Ok(())
    }
}

/// Minutes as hours, two decimals.
fn hours(minutes: u32) -> f64 {
    (minutes as f64 / 60.0 * 100.0).round() / 100.0
}
