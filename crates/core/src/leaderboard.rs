//! Leaderboard standings.

use serde::{Deserialize, Serialize};
use crate::id::{CourseId, TeamId, UserId};
use crate::Time;

/// Which leaderboard a recalculation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardScope {
    /// Every trainee, across all courses
    Global,
    /// Users with progress in one course
    Course,
    /// Teams with at least one member
    Team,
}

impl std::fmt::Display for LeaderboardScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LeaderboardScope::Global => "global",
            LeaderboardScope::Course => "course",
            LeaderboardScope::Team => "team",
        };
        f.write_str(s)
    }
}

/// One user's row on a leaderboard.
///
/// Unique per (user_id, course_id) within a scope. Fully regenerated on every
/// recalculation; never authored incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStanding {
    /// The ranked user
    pub user_id: UserId,

    /// Course filter, None for the global board
    pub course_id: Option<CourseId>,

    /// Sum of quiz points earned
    pub total_points: u32,

    /// Count of completed modules
    pub modules_completed: u32,

    /// Accumulated learning time
    pub time_spent_minutes: u32,

    /// Correct quiz answers
    pub correct_answers: u32,

    /// Total quiz answers given
    pub total_answers: u32,

    /// Weighted ranking score
    pub weighted_score: f64,

    /// Dense rank, 1 = highest score. Ties share a rank.
    pub rank: u32,

    /// When the standing was computed
    pub calculated_at: Time,
}

/// One team's row on the team leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStanding {
    /// The ranked team
    pub team_id: TeamId,

    /// Course filter, None for the all-course board
    pub course_id: Option<CourseId>,

    /// Members counted into the average
    pub total_members: u32,

    /// Mean of member completion percentages
    pub average_completion_rate: f64,

    /// Sum of member quiz points
    pub total_points: u32,

    /// Weighted ranking score
    pub weighted_score: f64,

    /// Dense rank, 1 = highest score. Ties share a rank.
    pub rank: u32,

    /// When the standing was computed
    pub calculated_at: Time,
}

/// Assign dense ranks over standings already sorted by score descending.
///
/// Entries with equal scores share a rank and the next distinct score gets
/// the next rank, so ranks run 1..=distinct_scores with no gaps.
pub fn dense_ranks(scores: &[f64]) -> Vec<u32> {
    let mut ranks = Vec::with_capacity(scores.len());
    let mut rank = 0u32;
    let mut previous: Option<f64> = None;
    for &score in scores {
        if previous != Some(score) {
            rank += 1;
            previous = Some(score);
        }
        ranks.push(rank);
    }
    ranks
}
