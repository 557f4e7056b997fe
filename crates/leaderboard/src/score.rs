//! Weighted scoring.
//!
//! Scores are stable (same inputs, same score) and strictly monotonic in
//! every input, so more points can never rank a user lower.

/// Weights for the individual leaderboard score.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    /// Weight per completed module
    pub modules: f64,
    /// Weight on quiz accuracy (correct / total answers)
    pub accuracy: f64,
    /// Weight on quiz points, applied per hundred points
    pub points: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        // 40% modules, 30% accuracy, 30% points
        Self {
            modules: 40.0,
            accuracy: 30.0,
            points: 30.0,
        }
    }
}

impl ScoreWeights {
    /// Weighted score for one user.
    ///
    /// Accuracy is 0 for users with no quiz answers; points are normalized
    /// per hundred so the three terms sit on comparable scales.
    pub fn user_score(
        &self,
        total_points: u32,
        modules_completed: u32,
        correct_answers: u32,
        total_answers: u32,
    ) -> f64 {
        let accuracy = if total_answers == 0 {
            0.0
        } else {
            correct_answers as f64 / total_answers as f64
        };
        modules_completed as f64 * self.modules
            + accuracy * self.accuracy
            + total_points as f64 * self.points / 100.0
    }
}

/// Weights for the team leaderboard score.
#[derive(Debug, Clone, Copy)]
pub struct TeamWeights {
    /// Weight on the team's average completion rate
    pub completion: f64,
    /// Weight on points normalized by member count
    pub points: f64,
}

impl Default for TeamWeights {
    fn default() -> Self {
        Self {
            completion: 0.7,
            points: 0.3,
        }
    }
}

impl TeamWeights {
    /// Weighted score for one team.
    ///
    /// `average_completion` is the mean of member completion rates; the
    /// points term is normalized by team size so large teams get no free
    /// score from headcount alone.
    pub fn team_score(&self, average_completion: f64, total_points: u32, members: u32) -> f64 {
        let per_member_points = if members == 0 {
            0.0
        } else {
            total_points as f64 / members as f64
        };
        average_completion * self.completion + per_member_points * self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_score_is_monotonic_in_each_input() {
        let weights = ScoreWeights::default();

        let base = weights.user_score(100, 3, 8, 10);
        assert!(weights.user_score(101, 3, 8, 10) > base);
        assert!(weights.user_score(100, 4, 8, 10) > base);
        assert!(weights.user_score(100, 3, 9, 10) > base);
    }

    #[test]
    fn user_score_is_stable() {
        let weights = ScoreWeights::default();
        assert_eq!(
            weights.user_score(250, 7, 19, 25),
            weights.user_score(250, 7, 19, 25)
        );
    }

    #[test]
    fn no_answers_means_zero_accuracy() {
        let weights = ScoreWeights::default();
        assert_eq!(weights.user_score(0, 0, 0, 0), 0.0);
    }

    #[test]
    fn team_score_normalizes_points_by_size() {
        let weights = TeamWeights::default();
        let small = weights.team_score(50.0, 100, 2);
        let large = weights.team_score(50.0, 100, 10);
        assert!(small > large);
    }
}
