//! Per-user progress records.

use serde::{Deserialize, Serialize};
use crate::id::{CourseId, ModuleId, UserId};
use crate::status::ProgressStatus;
use crate::Time;

/// One user's progress through one module.
///
/// Created lazily on the first learning-activity event for the pair and
/// updated idempotently afterwards. Unique per (user_id, module_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleProgress {
    /// The learner
    pub user_id: UserId,

    /// The module
    pub module_id: ModuleId,

    /// Owning course, denormalized for aggregation
    pub course_id: CourseId,

    /// Lifecycle status, forward-only
    pub status: ProgressStatus,

    /// 0-100
    pub completion_percentage: u8,

    /// Accumulated learning time. Only ever added to.
    pub time_spent_minutes: u32,

    /// Cached sequencer verdict. The pure unlock computation is
    /// authoritative; this field is refreshed after every write for the
    /// owning (user, course).
    pub is_locked: bool,

    /// Set once, on the first activity
    pub started_at: Option<Time>,

    /// Set exactly once, on the transition into Completed
    pub completed_at: Option<Time>,

    /// Row creation time
    pub created_at: Time,

    /// Last activity time. Drives the daily analytics bucketing.
    pub updated_at: Time,
}

impl ModuleProgress {
    /// Fresh, untouched record for a (user, module) pair.
    pub fn new(user_id: UserId, module_id: ModuleId, course_id: CourseId, now: Time) -> Self {
        Self {
            user_id,
            module_id,
            course_id,
            status: ProgressStatus::NotStarted,
            completion_percentage: 0,
            time_spent_minutes: 0,
            is_locked: true,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One user's aggregate progress through one course.
///
/// A pure function of the ModuleProgress and QuizResult rows for the
/// (user, course), recomputed after every write. Unique per
/// (user_id, course_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseProgress {
    /// The learner
    pub user_id: UserId,

    /// The course
    pub course_id: CourseId,

    /// 0-100, floor of the counted-completed ratio
    pub completion_percentage: u8,

    /// Count of completed modules in the course
    pub modules_completed: u32,

    /// Count of modules in the course
    pub total_modules: u32,

    /// Sum of module time
    pub time_spent_minutes: u32,

    /// Sum of quiz points earned in the course
    pub total_points_earned: u32,

    /// Lifecycle status, derived canonically
    pub status: ProgressStatus,

    /// Set once, on the first activity
    pub started_at: Option<Time>,

    /// Set exactly once, on the transition into 100% completion
    pub completed_at: Option<Time>,

    /// Last activity time
    pub last_activity: Option<Time>,

    /// Row creation time
    pub created_at: Time,

    /// Last recompute time
    pub updated_at: Time,
}

impl CourseProgress {
    /// Fresh, untouched record for a (user, course) pair.
    pub fn new(user_id: UserId, course_id: CourseId, total_modules: u32, now: Time) -> Self {
        Self {
            user_id,
            course_id,
            completion_percentage: 0,
            modules_completed: 0,
            total_modules,
            time_spent_minutes: 0,
            total_points_earned: 0,
            status: ProgressStatus::NotStarted,
            started_at: None,
            completed_at: None,
            last_activity: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Floor percentage of completed over total, 0 when total is 0.
pub fn completion_percentage(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    (100 * completed / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_floors() {
        assert_eq!(completion_percentage(0, 0), 0);
        assert_eq!(completion_percentage(0, 3), 0);
        assert_eq!(completion_percentage(1, 3), 33);
        assert_eq!(completion_percentage(2, 3), 66);
        assert_eq!(completion_percentage(3, 3), 100);
    }
}
