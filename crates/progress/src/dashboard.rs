//! Trainee dashboard rollup.
//!
//! Aggregates a user's hours, points, stored global rank and per-course
//! overview into one read. Statuses come from the stored aggregates, which
//! the tracker keeps canonical; nothing here re-derives them.

use std::sync::Arc;
use serde::Serialize;
use traintrack_core::{
    CourseId, CourseProgress, CourseStatus, ProgressStatus, TrackError, UserId,
};
use traintrack_storage::Storage;

/// One course row on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct CourseOverview {
    /// The course
    pub course_id: CourseId,
    /// Course title
    pub title: String,
    /// The user's status in it
    pub status: ProgressStatus,
    /// The user's completion percentage
    pub completion_percentage: u8,
    /// Completed module count
    pub modules_completed: u32,
    /// Module count
    pub total_modules: u32,
    /// Whether the course is mandatory
    pub is_mandatory: bool,
}

/// Course counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CourseStats {
    /// Courses visible to the user
    pub total_courses: u32,
    /// Courses in progress
    pub active_courses: u32,
    /// Courses untouched
    pub not_started_courses: u32,
    /// Courses completed
    pub completed_courses: u32,
}

/// Everything the trainee dashboard shows.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    /// Total learning time, hours, one decimal
    pub total_active_hours: f64,
    /// Sum of quiz points across courses
    pub total_points: u32,
    /// Stored global leaderboard rank, if the user has been ranked
    pub rank: Option<u32>,
    /// Per-course overview rows
    pub courses: Vec<CourseOverview>,
    /// Course counts by status
    pub course_stats: CourseStats,
}

/// Dashboard read service.
pub struct DashboardService<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> DashboardService<S> {
    /// Create a new dashboard service.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Build the dashboard for a user.
    pub async fn dashboard(&self, user_id: UserId) -> Result<DashboardData, TrackError> {
        self.storage
            .load_user(user_id)
            .await?
            .ok_or_else(|| TrackError::not_found("user", user_id))?;

        let progress = self.storage.list_course_progress_for_user(user_id).await?;

        let total_minutes: u32 = progress.iter().map(|p| p.time_spent_minutes).sum();
        let total_active_hours = (total_minutes as f64 / 60.0 * 10.0).round() / 10.0;
        let total_points: u32 = progress.iter().map(|p| p.total_points_earned).sum();

        let rank = self
            .storage
            .list_user_standings(None)
            .await?
            .iter()
            .find(|s| s.user_id == user_id)
            .map(|s| s.rank);

        let mut courses = Vec::new();
        let mut stats = CourseStats::default();
        for course in self.storage.list_courses().await? {
            if course.status != CourseStatus::Published {
                continue;
            }

            let row = progress.iter().find(|p| p.course_id == course.id);
            let overview = match row {
                Some(p) => self.overview(&course.title, course.is_mandatory, p),
                None => CourseOverview {
                    course_id: course.id,
                    title: course.title.clone(),
                    status: ProgressStatus::NotStarted,
                    completion_percentage: 0,
                    modules_completed: 0,
                    total_modules: self.storage.list_modules(course.id).await?.len() as u32,
                    is_mandatory: course.is_mandatory,
                },
            };

            stats.total_courses += 1;
            match overview.status {
                ProgressStatus::NotStarted => stats.not_started_courses += 1,
                ProgressStatus::InProgress => stats.active_courses += 1,
                ProgressStatus::Completed => stats.completed_courses += 1,
            }
            courses.push(overview);
        }

        Ok(DashboardData {
            total_active_hours,
            total_points,
            rank,
            courses,
            course_stats: stats,
        })
    }

    fn overview(&self, title: &str, is_mandatory: bool, p: &CourseProgress) -> CourseOverview {
        CourseOverview {
            course_id: p.course_id,
            title: title.to_string(),
            status: p.status,
            completion_percentage: p.completion_percentage,
            modules_completed: p.modules_completed,
            total_modules: p.total_modules,
            is_mandatory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::ProgressTracker;
    use traintrack_core::{Course, Module, ModuleKind, Role, User};
    use traintrack_storage::JsonStorage;

    #[tokio::test]
    async fn dashboard_rolls_up_courses() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(JsonStorage::new(dir.path()).await.unwrap());

        let user = User::new("ada@example.com", "Ada", Role::Trainee);
        storage.save_user(&user).await.unwrap();

        let started = Course::new("Rust", "Intro");
        let untouched = Course::new("Go", "Intro");
        storage.save_course(&started).await.unwrap();
        storage.save_course(&untouched).await.unwrap();

        let m1 = Module::new(started.id, "M1", ModuleKind::Video, 1);
        let m2 = Module::new(started.id, "M2", ModuleKind::Video, 2);
        storage.save_module(&m1).await.unwrap();
        storage.save_module(&m2).await.unwrap();
        storage
            .save_module(&Module::new(untouched.id, "G1", ModuleKind::Pdf, 1))
            .await
            .unwrap();

        let tracker = ProgressTracker::new(storage.clone());
        tracker
            .record_module_activity(user.id, m1.id, 90, true)
            .await
            .unwrap();

        let dashboard = DashboardService::new(storage.clone())
            .dashboard(user.id)
            .await
            .unwrap();

        assert_eq!(dashboard.total_active_hours, 1.5);
        assert_eq!(dashboard.rank, None);
        assert_eq!(
            dashboard.course_stats,
            CourseStats {
                total_courses: 2,
                active_courses: 1,
                not_started_courses: 1,
                completed_courses: 0,
            }
        );

        let row = dashboard
            .courses
            .iter()
            .find(|c| c.course_id == started.id)
            .unwrap();
        assert_eq!(row.completion_percentage, 50);
        assert_eq!(row.modules_completed, 1);

        let row = dashboard
            .courses
            .iter()
            .find(|c| c.course_id == untouched.id)
            .unwrap();
        assert_eq!(row.status, ProgressStatus::NotStarted);
        assert_eq!(row.total_modules, 1);
    }

    #[tokio::test]
    async fn dashboard_requires_known_user() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(JsonStorage::new(dir.path()).await.unwrap());

        let err = DashboardService::new(storage)
            .dashboard(UserId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TrackError::NotFound(_)));
    }
}
