//! SQLite storage backend.
//!
//! Stores every entity as a JSON document in a single `entities` table keyed
//! by a typed id string. Composite keys join their parts with `:`. Each
//! leaderboard is one document, so replacing and listing a board is a
//! consistent snapshot.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;
use traintrack_core::{
    AttemptId, Course, CourseId, CourseProgress, Module, ModuleId, ModuleProgress, QuizResult,
    Team, TeamId, TeamStanding, User, UserId, UserStanding,
};

use super::{Result, Storage, StorageError};

/// SQLite storage implementation.
#[derive(Clone)]
pub struct SqliteStorage {
    /// Database connection pool
    pool: sqlx::SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if missing) a database at `db_path`.
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = sqlx::sqlite::SqliteConnectOptions::from_str(db_path)
            .map_err(|e| StorageError::Other(e.to_string()))?
            .create_if_missing(true);
        let pool = sqlx::SqlitePool::connect_with(options)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let storage = Self { pool };
        storage.init_schema().await?;

        Ok(storage)
    }

    /// Create an in-memory SQLite storage for testing.
    pub async fn in_memory() -> Result<Self> {
        let pool = sqlx::SqlitePool::connect(":memory:")
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let storage = Self { pool };
        storage.init_schema().await?;

        Ok(storage)
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS entities (
                id TEXT PRIMARY KEY,
                entity_type TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(entity_type)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        Ok(())
    }

    async fn put<T: Serialize>(&self, id: &str, entity_type: &str, value: &T) -> Result<()> {
        let data = serde_json::to_string(value)?;
        let now = chrono::Utc::now();

        sqlx::query(
            "INSERT OR REPLACE INTO entities (id, entity_type, data, updated_at)
            VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(entity_type)
        .bind(data)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Other(e.to_string()))?;

        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, id: &str) -> Result<Option<T>> {
        let row = sqlx::query("SELECT data FROM entities WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        match row {
            Some(row) => {
                let data: String = row
                    .try_get("data")
                    .map_err(|e| StorageError::Other(e.to_string()))?;
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn list<T: DeserializeOwned>(&self, entity_type: &str) -> Result<Vec<T>> {
        let rows = sqlx::query("SELECT id, data FROM entities WHERE entity_type = ? ORDER BY id")
            .bind(entity_type)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let data: String = row
                .try_get("data")
                .map_err(|e| StorageError::Other(e.to_string()))?;
            match serde_json::from_str(&data) {
                Ok(value) => out.push(value),
                Err(e) => {
                    let id: String = row.try_get("id").unwrap_or_default();
                    warn!(entity = %id, error = %e, "skipping undecodable entity row");
                }
            }
        }
        Ok(out)
    }

    fn standings_key(prefix: &str, course_id: Option<CourseId>) -> String {
        match course_id {
            Some(course) => format!("{}:course:{}", prefix, course),
            None => format!("{}:global", prefix),
        }
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    // === User operations ===

    async fn save_user(&self, user: &User) -> Result<()> {
        self.put(&format!("user:{}", user.id), "user", user).await
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>> {
        self.get(&format!("user:{}", id)).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.list("user").await
    }

    // === Team operations ===

    async fn save_team(&self, team: &Team) -> Result<()> {
        self.put(&format!("team:{}", team.id), "team", team).await
    }

    async fn load_team(&self, id: TeamId) -> Result<Option<Team>> {
        self.get(&format!("team:{}", id)).await
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        self.list("team").await
    }

    // === Catalog operations ===

    async fn save_course(&self, course: &Course) -> Result<()> {
        self.put(&format!("course:{}", course.id), "course", course)
            .await
    }

    async fn load_course(&self, id: CourseId) -> Result<Option<Course>> {
        self.get(&format!("course:{}", id)).await
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        self.list("course").await
    }

    async fn save_module(&self, module: &Module) -> Result<()> {
        self.put(&format!("module:{}", module.id), "module", module)
            .await
    }

    async fn load_module(&self, id: ModuleId) -> Result<Option<Module>> {
        self.get(&format!("module:{}", id)).await
    }

    async fn list_modules(&self, course_id: CourseId) -> Result<Vec<Module>> {
        let mut modules: Vec<Module> = self
            .list("module")
            .await?
            .into_iter()
            .filter(|m: &Module| m.course_id == course_id)
            .collect();
        modules.sort_by_key(|m| m.sequence_order);
        Ok(modules)
    }

    // === Module progress operations ===

    async fn save_module_progress(&self, progress: &ModuleProgress) -> Result<()> {
        let id = format!("mp:{}:{}", progress.user_id, progress.module_id);
        self.put(&id, "module_progress", progress).await
    }

    async fn load_module_progress(
        &self,
        user_id: UserId,
        module_id: ModuleId,
    ) -> Result<Option<ModuleProgress>> {
        self.get(&format!("mp:{}:{}", user_id, module_id)).await
    }

    async fn list_module_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ModuleProgress>> {
        let rows: Vec<ModuleProgress> = self.list("module_progress").await?;
        Ok(rows
            .into_iter()
            .filter(|p| p.user_id == user_id && p.course_id == course_id)
            .collect())
    }

    async fn list_module_progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ModuleProgress>> {
        let rows: Vec<ModuleProgress> = self.list("module_progress").await?;
        Ok(rows.into_iter().filter(|p| p.user_id == user_id).collect())
    }

    // === Course progress operations ===

    async fn save_course_progress(&self, progress: &CourseProgress) -> Result<()> {
        let id = format!("cp:{}:{}", progress.user_id, progress.course_id);
        self.put(&id, "course_progress", progress).await
    }

    async fn load_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>> {
        self.get(&format!("cp:{}:{}", user_id, course_id)).await
    }

    async fn list_course_progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CourseProgress>> {
        let rows: Vec<CourseProgress> = self.list("course_progress").await?;
        Ok(rows.into_iter().filter(|p| p.user_id == user_id).collect())
    }

    async fn list_course_progress_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<CourseProgress>> {
        let rows: Vec<CourseProgress> = self.list("course_progress").await?;
        Ok(rows
            .into_iter()
            .filter(|p| p.course_id == course_id)
            .collect())
    }

    // === Quiz result operations ===

    async fn save_quiz_result(&self, result: &QuizResult) -> Result<()> {
        let id = format!("quiz:{}", result.attempt_id);
        self.put(&id, "quiz_result", result).await
    }

    async fn load_quiz_result(&self, id: AttemptId) -> Result<Option<QuizResult>> {
        self.get(&format!("quiz:{}", id)).await
    }

    async fn list_quiz_results(
        &self,
        user_id: UserId,
        course_id: Option<CourseId>,
    ) -> Result<Vec<QuizResult>> {
        let rows: Vec<QuizResult> = self.list("quiz_result").await?;
        Ok(rows
            .into_iter()
            .filter(|r| {
                r.user_id == user_id && course_id.map(|c| r.course_id == c).unwrap_or(true)
            })
            .collect())
    }

    // === Leaderboard standings ===

    async fn replace_user_standings(
        &self,
        course_id: Option<CourseId>,
        standings: &[UserStanding],
    ) -> Result<()> {
        let key = Self::standings_key("ustand", course_id);
        self.put(&key, "user_standings", &standings).await
    }

    async fn list_user_standings(
        &self,
        course_id: Option<CourseId>,
    ) -> Result<Vec<UserStanding>> {
        let key = Self::standings_key("ustand", course_id);
        Ok(self.get(&key).await?.unwrap_or_default())
    }

    async fn replace_team_standings(
        &self,
        course_id: Option<CourseId>,
        standings: &[TeamStanding],
    ) -> Result<()> {
        let key = Self::standings_key("tstand", course_id);
        self.put(&key, "team_standings", &standings).await
    }

    async fn list_team_standings(
        &self,
        course_id: Option<CourseId>,
    ) -> Result<Vec<TeamStanding>> {
        let key = Self::standings_key("tstand", course_id);
        Ok(self.get(&key).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traintrack_core::{ModuleKind, Role};

    #[tokio::test]
    async fn entity_round_trip() {
        let storage = SqliteStorage::in_memory().await.unwrap();

        let user = User::new("grace@example.com", "Grace", Role::Trainee);
        storage.save_user(&user).await.unwrap();

        let loaded = storage.load_user(user.id).await.unwrap().unwrap();
        assert_eq!(loaded.email, "grace@example.com");

        assert!(storage.load_user(UserId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_row() {
        let storage = SqliteStorage::in_memory().await.unwrap();

        let course = Course::new("Rust", "Intro");
        let mut module = Module::new(course.id, "Ownership", ModuleKind::Video, 1);
        storage.save_module(&module).await.unwrap();

        module.estimated_duration_minutes = 45;
        storage.save_module(&module).await.unwrap();

        let modules = storage.list_modules(course.id).await.unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].estimated_duration_minutes, 45);
    }

    #[tokio::test]
    async fn module_progress_filters_by_course() {
        let storage = SqliteStorage::in_memory().await.unwrap();

        let user_id = UserId::new();
        let course_a = CourseId::new();
        let course_b = CourseId::new();
        let now = chrono::Utc::now();

        storage
            .save_module_progress(&ModuleProgress::new(user_id, ModuleId::new(), course_a, now))
            .await
            .unwrap();
        storage
            .save_module_progress(&ModuleProgress::new(user_id, ModuleId::new(), course_b, now))
            .await
            .unwrap();

        assert_eq!(
            storage.list_module_progress(user_id, course_a).await.unwrap().len(),
            1
        );
        assert_eq!(
            storage
                .list_module_progress_for_user(user_id)
                .await
                .unwrap()
                .len(),
            2
        );
    }
}
