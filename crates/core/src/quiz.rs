//! Quiz attempt results.

use serde::{Deserialize, Serialize};
use crate::id::{AttemptId, CourseId, ModuleId, UserId};
use crate::Time;

/// Outcome of one graded quiz attempt.
///
/// Feeds `total_points_earned` on the course aggregate and the accuracy
/// component of the leaderboard weighted score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    /// Unique attempt identifier
    pub attempt_id: AttemptId,

    /// The learner
    pub user_id: UserId,

    /// The quiz module attempted
    pub module_id: ModuleId,

    /// Owning course, denormalized for aggregation
    pub course_id: CourseId,

    /// Questions in the quiz
    pub total_questions: u32,

    /// Correctly answered
    pub correct_answers: u32,

    /// 0-100
    pub score_percentage: f64,

    /// Points awarded for this attempt
    pub points_earned: u32,

    /// Maximum points available
    pub max_points: u32,

    /// Whether the attempt met the passing criteria
    pub passed: bool,

    /// Submission time
    pub submitted_at: Time,
}

impl QuizResult {
    /// Score percentage from answer counts, 0 when the quiz has no questions.
    pub fn score_of(correct: u32, total: u32) -> f64 {
        if total == 0 {
            0.0
        } else {
            100.0 * correct as f64 / total as f64
        }
    }
}
