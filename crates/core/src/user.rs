//! Users and teams.

use serde::{Deserialize, Serialize};
use crate::id::{TeamId, UserId};

/// Role a user holds in the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform administrator
    Admin,
    /// Authors courses, reviews trainees
    Trainer,
    /// Takes courses; the only role ranked on leaderboards
    Trainee,
}

/// A platform user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: UserId,

    /// Login email, unique
    pub email: String,

    /// Display name
    pub name: String,

    /// Platform role
    pub role: Role,
}

impl User {
    /// Create a new user with a fresh id.
    pub fn new(email: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(),
            email: email.into(),
            name: name.into(),
            role,
        }
    }

    /// True for users that appear on leaderboards.
    pub fn is_trainee(&self) -> bool {
        self.role == Role::Trainee
    }
}

/// A team of users, ranked together on the team leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Unique identifier
    pub id: TeamId,

    /// Team name
    pub name: String,

    /// Member user ids
    pub members: Vec<UserId>,
}

impl Team {
    /// Create a new team with a fresh id.
    pub fn new(name: impl Into<String>, members: Vec<UserId>) -> Self {
        Self {
            id: TeamId::new(),
            name: name.into(),
            members,
        }
    }
}
