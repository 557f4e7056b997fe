//! Storage trait abstraction.

use async_trait::async_trait;
use traintrack_core::{
    AttemptId, Course, CourseId, CourseProgress, Module, ModuleId, ModuleProgress, QuizResult,
    Team, TeamId, TeamStanding, TrackError, User, UserId, UserStanding,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<StorageError> for TrackError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => TrackError::NotFound(what),
            other => TrackError::Unavailable(other.to_string()),
        }
    }
}

/// Storage abstraction for traintrack data.
///
/// Covers the persistence layer, the course catalog and the identity
/// directory. Methods take `&self`; backends use interior mutability or a
/// connection pool so services can share one instance across parallel
/// activity recording. Single-row saves are atomic upserts.
#[async_trait]
pub trait Storage: Send + Sync {
    // === User operations ===

    /// Save a user (create or update).
    async fn save_user(&self, user: &User) -> Result<()>;

    /// Load a user by ID.
    async fn load_user(&self, id: UserId) -> Result<Option<User>>;

    /// List all users.
    async fn list_users(&self) -> Result<Vec<User>>;

    // === Team operations ===

    /// Save a team (create or update).
    async fn save_team(&self, team: &Team) -> Result<()>;

    /// Load a team by ID.
    async fn load_team(&self, id: TeamId) -> Result<Option<Team>>;

    /// List all teams.
    async fn list_teams(&self) -> Result<Vec<Team>>;

    // === Catalog operations ===

    /// Save a course (create or update).
    async fn save_course(&self, course: &Course) -> Result<()>;

    /// Load a course by ID.
    async fn load_course(&self, id: CourseId) -> Result<Option<Course>>;

    /// List all courses.
    async fn list_courses(&self) -> Result<Vec<Course>>;

    /// Save a module (create or update).
    async fn save_module(&self, module: &Module) -> Result<()>;

    /// Load a module by ID.
    async fn load_module(&self, id: ModuleId) -> Result<Option<Module>>;

    /// List a course's modules ordered by sequence_order.
    async fn list_modules(&self, course_id: CourseId) -> Result<Vec<Module>>;

    // === Module progress operations ===

    /// Upsert a module progress row.
    async fn save_module_progress(&self, progress: &ModuleProgress) -> Result<()>;

    /// Load the progress row for a (user, module) pair.
    async fn load_module_progress(
        &self,
        user_id: UserId,
        module_id: ModuleId,
    ) -> Result<Option<ModuleProgress>>;

    /// List a user's progress rows within one course.
    async fn list_module_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ModuleProgress>>;

    /// List all of a user's module progress rows.
    async fn list_module_progress_for_user(&self, user_id: UserId)
        -> Result<Vec<ModuleProgress>>;

    // === Course progress operations ===

    /// Upsert a course progress row.
    async fn save_course_progress(&self, progress: &CourseProgress) -> Result<()>;

    /// Load the aggregate row for a (user, course) pair.
    async fn load_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>>;

    /// List all of a user's course aggregates.
    async fn list_course_progress_for_user(&self, user_id: UserId)
        -> Result<Vec<CourseProgress>>;

    /// List every user's aggregate for one course.
    async fn list_course_progress_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<CourseProgress>>;

    // === Quiz result operations ===

    /// Save a quiz attempt result.
    async fn save_quiz_result(&self, result: &QuizResult) -> Result<()>;

    /// Load a quiz result by attempt ID.
    async fn load_quiz_result(&self, id: AttemptId) -> Result<Option<QuizResult>>;

    /// List a user's quiz results, optionally filtered to one course.
    async fn list_quiz_results(
        &self,
        user_id: UserId,
        course_id: Option<CourseId>,
    ) -> Result<Vec<QuizResult>>;

    // === Leaderboard standings ===

    /// Replace the stored user standings for a board (global or one course).
    async fn replace_user_standings(
        &self,
        course_id: Option<CourseId>,
        standings: &[UserStanding],
    ) -> Result<()>;

    /// List the stored user standings for a board, in rank order.
    async fn list_user_standings(&self, course_id: Option<CourseId>)
        -> Result<Vec<UserStanding>>;

    /// Replace the stored team standings for a board.
    async fn replace_team_standings(
        &self,
        course_id: Option<CourseId>,
        standings: &[TeamStanding],
    ) -> Result<()>;

    /// List the stored team standings for a board, in rank order.
    async fn list_team_standings(&self, course_id: Option<CourseId>)
        -> Result<Vec<TeamStanding>>;
}
