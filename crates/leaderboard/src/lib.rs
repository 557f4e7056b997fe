//! Leaderboards
//!
//! Weighted scoring and full-board recalculation for individual and team
//! rankings.

#![warn(missing_docs)]

pub mod score;
pub mod ranker;

pub use score::{ScoreWeights, TeamWeights};
pub use ranker::{Leaderboard, LeaderboardRanker};
