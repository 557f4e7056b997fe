//! Leaderboard recalculation.
//!
//! Recalculation reads everything it needs before writing, then overwrites
//! the stored standings for the board wholesale. With no intervening data
//! changes it is idempotent down to the rank assignment.

use std::cmp::Ordering;
use std::sync::Arc;
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use traintrack_core::{
    dense_ranks, CourseId, LeaderboardScope, TeamStanding, TrackError, UserId, UserStanding,
};
use traintrack_storage::Storage;

use crate::score::{ScoreWeights, TeamWeights};

/// Result of one recalculation, in rank order.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Leaderboard {
    /// Individual standings
    Users(Vec<UserStanding>),
    /// Team standings
    Teams(Vec<TeamStanding>),
}

/// Aggregated score inputs for one user.
#[derive(Debug, Clone, Copy, Default)]
struct UserStats {
    total_points: u32,
    modules_completed: u32,
    time_spent_minutes: u32,
    correct_answers: u32,
    total_answers: u32,
}

/// Leaderboard recalculation service.
pub struct LeaderboardRanker<S: Storage> {
    storage: Arc<S>,
    weights: ScoreWeights,
    team_weights: TeamWeights,
}

impl<S: Storage> LeaderboardRanker<S> {
    /// Create a ranker with the default weights.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            weights: ScoreWeights::default(),
            team_weights: TeamWeights::default(),
        }
    }

    /// Create a ranker with explicit weights.
    pub fn with_weights(storage: Arc<S>, weights: ScoreWeights, team_weights: TeamWeights) -> Self {
        Self {
            storage,
            weights,
            team_weights,
        }
    }

    /// Recalculate one board and overwrite its stored standings.
    ///
    /// Global boards take no course filter; course boards require one; team
    /// boards accept either.
    pub async fn recalculate(
        &self,
        scope: LeaderboardScope,
        course_id: Option<CourseId>,
    ) -> Result<Leaderboard, TrackError> {
        match scope {
            LeaderboardScope::Global => {
                if course_id.is_some() {
                    return Err(TrackError::InvalidArgument(
                        "global leaderboard takes no course filter".to_string(),
                    ));
                }
                Ok(Leaderboard::Users(self.recalculate_users(None).await?))
            }
            LeaderboardScope::Course => {
                let course_id = course_id.ok_or_else(|| {
                    TrackError::InvalidArgument(
                        "course leaderboard requires a course".to_string(),
                    )
                })?;
                self.storage
                    .load_course(course_id)
                    .await?
                    .ok_or_else(|| TrackError::not_found("course", course_id))?;
                Ok(Leaderboard::Users(
                    self.recalculate_users(Some(course_id)).await?,
                ))
            }
            LeaderboardScope::Team => Ok(Leaderboard::Teams(
                self.recalculate_teams(course_id).await?,
            )),
        }
    }

    /// Stored rank for a user on the global or a course board.
    pub async fn rank_for_user(
        &self,
        user_id: UserId,
        course_id: Option<CourseId>,
    ) -> Result<Option<u32>, TrackError> {
        Ok(self
            .storage
            .list_user_standings(course_id)
            .await?
            .iter()
            .find(|s| s.user_id == user_id)
            .map(|s| s.rank))
    }

    async fn recalculate_users(
        &self,
        course_id: Option<CourseId>,
    ) -> Result<Vec<UserStanding>, TrackError> {
        let now = Utc::now();

        // Candidate gathering. Global: every trainee, including ones with no
        // activity yet. Course: every user holding an aggregate for it.
        let mut inputs: Vec<(UserId, UserStats)> = Vec::new();
        match course_id {
            None => {
                for user in self.storage.list_users().await? {
                    if !user.is_trainee() {
                        continue;
                    }
                    let stats = self.user_stats(user.id, None).await?;
                    inputs.push((user.id, stats));
                }
            }
            Some(course) => {
                for row in self
                    .storage
                    .list_course_progress_for_course(course)
                    .await?
                {
                    let stats = self.user_stats(row.user_id, Some(course)).await?;
                    inputs.push((row.user_id, stats));
                }
            }
        }

        let mut standings: Vec<UserStanding> = inputs
            .into_iter()
            .map(|(user_id, stats)| UserStanding {
                user_id,
                course_id,
                total_points: stats.total_points,
                modules_completed: stats.modules_completed,
                time_spent_minutes: stats.time_spent_minutes,
                correct_answers: stats.correct_answers,
                total_answers: stats.total_answers,
                weighted_score: self.weights.user_score(
                    stats.total_points,
                    stats.modules_completed,
                    stats.correct_answers,
                    stats.total_answers,
                ),
                rank: 0,
                calculated_at: now,
            })
            .collect();

        standings.sort_by(|a, b| {
            b.weighted_score
                .partial_cmp(&a.weighted_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        let scores: Vec<f64> = standings.iter().map(|s| s.weighted_score).collect();
        for (standing, rank) in standings.iter_mut().zip(dense_ranks(&scores)) {
            standing.rank = rank;
        }

        self.storage
            .replace_user_standings(course_id, &standings)
            .await?;
        let board = course_id
            .map(|c| c.to_string())
            .unwrap_or_else(|| "global".to_string());
        info!(entries = standings.len(), board = %board, "recalculated individual leaderboard");
        Ok(standings)
    }

    async fn recalculate_teams(
        &self,
        course_id: Option<CourseId>,
    ) -> Result<Vec<TeamStanding>, TrackError> {
        let now = Utc::now();

        let mut standings: Vec<TeamStanding> = Vec::new();
        for team in self.storage.list_teams().await? {
            // Memberless teams are not candidates.
            if team.members.is_empty() {
                continue;
            }

            let mut completion_sum = 0.0;
            let mut total_points = 0u32;
            for member in &team.members {
                let rows = match course_id {
                    Some(course) => self
                        .storage
                        .load_course_progress(*member, course)
                        .await?
                        .into_iter()
                        .collect::<Vec<_>>(),
                    None => self.storage.list_course_progress_for_user(*member).await?,
                };

                // A member with no progress contributes a flat zero; the
                // team score is always an average across the full roster.
                let member_rate = if rows.is_empty() {
                    0.0
                } else {
                    rows.iter()
                        .map(|r| r.completion_percentage as f64)
                        .sum::<f64>()
                        / rows.len() as f64
                };
                completion_sum += member_rate;
                total_points += rows.iter().map(|r| r.total_points_earned).sum::<u32>();
            }

            let total_members = team.members.len() as u32;
            let average_completion_rate = completion_sum / total_members as f64;

            standings.push(TeamStanding {
                team_id: team.id,
                course_id,
                total_members,
                average_completion_rate,
                total_points,
                weighted_score: self.team_weights.team_score(
                    average_completion_rate,
                    total_points,
                    total_members,
                ),
                rank: 0,
                calculated_at: now,
            });
        }

        standings.sort_by(|a, b| {
            b.weighted_score
                .partial_cmp(&a.weighted_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.team_id.cmp(&b.team_id))
        });
        let scores: Vec<f64> = standings.iter().map(|s| s.weighted_score).collect();
        for (standing, rank) in standings.iter_mut().zip(dense_ranks(&scores)) {
            standing.rank = rank;
        }

        self.storage
            .replace_team_standings(course_id, &standings)
            .await?;
        info!(teams = standings.len(), "recalculated team leaderboard");
        Ok(standings)
    }

    async fn user_stats(
        &self,
        user_id: UserId,
        course_id: Option<CourseId>,
    ) -> Result<UserStats, TrackError> {
        let rows = match course_id {
            Some(course) => self
                .storage
                .load_course_progress(user_id, course)
                .await?
                .into_iter()
                .collect::<Vec<_>>(),
            None => self.storage.list_course_progress_for_user(user_id).await?,
        };
        let quiz_results = self.storage.list_quiz_results(user_id, course_id).await?;

        let mut stats = UserStats::default();
        for row in &rows {
            stats.total_points += row.total_points_earned;
            stats.modules_completed += row.modules_completed;
            stats.time_spent_minutes += row.time_spent_minutes;
        }
        for result in &quiz_results {
            stats.correct_answers += result.correct_answers;
            stats.total_answers += result.total_questions;
        }
        Ok(stats)
    }
}
