//! Canonical progress status state machine.
//!
//! Status is derived and advanced in exactly one place. Every consumer goes
//! through these functions instead of re-deriving status from percentage or
//! timestamp fields.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a module or course for one user.
///
/// Transitions only move forward: NotStarted -> InProgress -> Completed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    /// No recorded activity yet
    #[default]
    NotStarted,
    /// Some activity recorded, not yet complete
    InProgress,
    /// Fully completed
    Completed,
}

impl ProgressStatus {
    /// Advance to `next`, never regressing.
    ///
    /// A completed module stays completed no matter what later events claim.
    pub fn advanced_to(self, next: ProgressStatus) -> ProgressStatus {
        self.max(next)
    }

    /// Derive a course status from its module completion counts.
    ///
    /// Completed requires every counted module done (and at least one module
    /// to exist). Any partial completion or recorded activity is InProgress.
    pub fn for_course(completed_modules: u32, total_modules: u32, has_activity: bool) -> Self {
        if total_modules > 0 && completed_modules >= total_modules {
            ProgressStatus::Completed
        } else if completed_modules > 0 || has_activity {
            ProgressStatus::InProgress
        } else {
            ProgressStatus::NotStarted
        }
    }

    /// True once the status has reached Completed.
    pub fn is_completed(self) -> bool {
        matches!(self, ProgressStatus::Completed)
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_never_regresses() {
        let completed = ProgressStatus::Completed;
        assert_eq!(
            completed.advanced_to(ProgressStatus::InProgress),
            ProgressStatus::Completed
        );
        assert_eq!(
            completed.advanced_to(ProgressStatus::NotStarted),
            ProgressStatus::Completed
        );

        let in_progress = ProgressStatus::NotStarted.advanced_to(ProgressStatus::InProgress);
        assert_eq!(in_progress, ProgressStatus::InProgress);
        assert_eq!(
            in_progress.advanced_to(ProgressStatus::NotStarted),
            ProgressStatus::InProgress
        );
    }

    #[test]
    fn course_status_derivation() {
        assert_eq!(
            ProgressStatus::for_course(0, 5, false),
            ProgressStatus::NotStarted
        );
        assert_eq!(
            ProgressStatus::for_course(0, 5, true),
            ProgressStatus::InProgress
        );
        assert_eq!(
            ProgressStatus::for_course(2, 5, true),
            ProgressStatus::InProgress
        );
        assert_eq!(
            ProgressStatus::for_course(5, 5, true),
            ProgressStatus::Completed
        );
        // Empty course can never be completed
        assert_eq!(
            ProgressStatus::for_course(0, 0, false),
            ProgressStatus::NotStarted
        );
    }
}
