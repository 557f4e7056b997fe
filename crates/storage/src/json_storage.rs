//! JSON file storage implementation.
//!
//! Stores every entity as a JSON file in a per-kind subdirectory. Composite
//! keys (user+module, user+course) become `<a>_<b>.json` filenames; each
//! leaderboard is a single file so replacing and listing it is a consistent
//! snapshot.

use std::path::Path;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use traintrack_core::{
    AttemptId, Course, CourseId, CourseProgress, Module, ModuleId, ModuleProgress, QuizResult,
    Team, TeamId, TeamStanding, User, UserId, UserStanding,
};

use super::{Result, Storage, StorageError};

const KINDS: &[&str] = &[
    "users",
    "teams",
    "courses",
    "modules",
    "module_progress",
    "course_progress",
    "quiz_results",
    "user_standings",
    "team_standings",
];

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: std::path::PathBuf,
}

impl JsonStorage {
    /// Create storage rooted at `root`, creating the per-kind
    /// subdirectories as needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        for kind in KINDS {
            fs::create_dir_all(root.join(kind)).await?;
        }

        Ok(Self { root })
    }

    fn user_path(&self, id: UserId) -> std::path::PathBuf {
        self.root.join("users").join(format!("{}.json", id))
    }
    fn team_path(&self, id: TeamId) -> std::path::PathBuf {
        self.root.join("teams").join(format!("{}.json", id))
    }
    fn course_path(&self, id: CourseId) -> std::path::PathBuf {
        self.root.join("courses").join(format!("{}.json", id))
    }
    fn module_path(&self, id: ModuleId) -> std::path::PathBuf {
        self.root.join("modules").join(format!("{}.json", id))
    }
    fn module_progress_path(&self, user_id: UserId, module_id: ModuleId) -> std::path::PathBuf {
        self.root
            .join("module_progress")
            .join(format!("{}_{}.json", user_id, module_id))
    }
    fn course_progress_path(&self, user_id: UserId, course_id: CourseId) -> std::path::PathBuf {
        self.root
            .join("course_progress")
            .join(format!("{}_{}.json", user_id, course_id))
    }
    fn quiz_result_path(&self, id: AttemptId) -> std::path::PathBuf {
        self.root.join("quiz_results").join(format!("{}.json", id))
    }
    fn standings_path(&self, kind: &str, course_id: Option<CourseId>) -> std::path::PathBuf {
        let name = match course_id {
            Some(course) => format!("course_{}.json", course),
            None => "global.json".to_string(),
        };
        self.root.join(kind).join(name)
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_user(&self, user: &User) -> Result<()> {
        self.write_json(&self.user_path(user.id), user).await
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>> {
        read_json(&self.user_path(id)).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        list_dir(&self.root.join("users")).await
    }

    async fn save_team(&self, team: &Team) -> Result<()> {
        self.write_json(&self.team_path(team.id), team).await
    }

    async fn load_team(&self, id: TeamId) -> Result<Option<Team>> {
        read_json(&self.team_path(id)).await
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        list_dir(&self.root.join("teams")).await
    }

    async fn save_course(&self, course: &Course) -> Result<()> {
        self.write_json(&self.course_path(course.id), course).await
    }

    async fn load_course(&self, id: CourseId) -> Result<Option<Course>> {
        read_json(&self.course_path(id)).await
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        list_dir(&self.root.join("courses")).await
    }

    async fn save_module(&self, module: &Module) -> Result<()> {
        self.write_json(&self.module_path(module.id), module).await
    }

    async fn load_module(&self, id: ModuleId) -> Result<Option<Module>> {
        read_json(&self.module_path(id)).await
    }

    async fn list_modules(&self, course_id: CourseId) -> Result<Vec<Module>> {
        let mut modules: Vec<Module> = list_dir(&self.root.join("modules"))
            .await?
            .into_iter()
            .filter(|m: &Module| m.course_id == course_id)
            .collect();
        modules.sort_by_key(|m| m.sequence_order);
        Ok(modules)
    }

    async fn save_module_progress(&self, progress: &ModuleProgress) -> Result<()> {
        let path = self.module_progress_path(progress.user_id, progress.module_id);
        self.write_json(&path, progress).await
    }

    async fn load_module_progress(
        &self,
        user_id: UserId,
        module_id: ModuleId,
    ) -> Result<Option<ModuleProgress>> {
        read_json(&self.module_progress_path(user_id, module_id)).await
    }

    async fn list_module_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ModuleProgress>> {
        let rows: Vec<ModuleProgress> = list_dir(&self.root.join("module_progress")).await?;
        Ok(rows
            .into_iter()
            .filter(|p| p.user_id == user_id && p.course_id == course_id)
            .collect())
    }

    async fn list_module_progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ModuleProgress>> {
        let rows: Vec<ModuleProgress> = list_dir(&self.root.join("module_progress")).await?;
        Ok(rows.into_iter().filter(|p| p.user_id == user_id).collect())
    }

    async fn save_course_progress(&self, progress: &CourseProgress) -> Result<()> {
        let path = self.course_progress_path(progress.user_id, progress.course_id);
        self.write_json(&path, progress).await
    }

    async fn load_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>> {
        read_json(&self.course_progress_path(user_id, course_id)).await
    }

    async fn list_course_progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CourseProgress>> {
        let rows: Vec<CourseProgress> = list_dir(&self.root.join("course_progress")).await?;
        Ok(rows.into_iter().filter(|p| p.user_id == user_id).collect())
    }

    async fn list_course_progress_for_course(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<CourseProgress>> {
        let rows: Vec<CourseProgress> = list_dir(&self.root.join("course_progress")).await?;
        Ok(rows
            .into_iter()
            .filter(|p| p.course_id == course_id)
            .collect())
    }

    async fn save_quiz_result(&self, result: &QuizResult) -> Result<()> {
        self.write_json(&self.quiz_result_path(result.attempt_id), result)
            .await
    }

    async fn load_quiz_result(&self, id: AttemptId) -> Result<Option<QuizResult>> {
        read_json(&self.quiz_result_path(id)).await
    }

    async fn list_quiz_results(
        &self,
        user_id: UserId,
        course_id: Option<CourseId>,
    ) -> Result<Vec<QuizResult>> {
        let rows: Vec<QuizResult> = list_dir(&self.root.join("quiz_results")).await?;
        Ok(rows
            .into_iter()
            .filter(|r| {
                r.user_id == user_id && course_id.map(|c| r.course_id == c).unwrap_or(true)
            })
            .collect())
    }

    async fn replace_user_standings(
        &self,
        course_id: Option<CourseId>,
        standings: &[UserStanding],
    ) -> Result<()> {
        let path = self.standings_path("user_standings", course_id);
        self.write_json(&path, &standings).await
    }

    async fn list_user_standings(
        &self,
        course_id: Option<CourseId>,
    ) -> Result<Vec<UserStanding>> {
        let path = self.standings_path("user_standings", course_id);
        Ok(read_json(&path).await?.unwrap_or_default())
    }

    async fn replace_team_standings(
        &self,
        course_id: Option<CourseId>,
        standings: &[TeamStanding],
    ) -> Result<()> {
        let path = self.standings_path("team_standings", course_id);
        self.write_json(&path, &standings).await
    }

    async fn list_team_standings(
        &self,
        course_id: Option<CourseId>,
    ) -> Result<Vec<TeamStanding>> {
        let path = self.standings_path("team_standings", course_id);
        Ok(read_json(&path).await?.unwrap_or_default())
    }
}

/// Read a JSON file, returning None when the file does not exist.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Read every JSON file in a directory.
async fn list_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut out = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            let contents = fs::read_to_string(&path).await?;
            out.push(serde_json::from_str(&contents)?);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use traintrack_core::{ModuleKind, Role};

    async fn temp_storage() -> (tempfile::TempDir, JsonStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStorage::new(dir.path()).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn user_round_trip() {
        let (_dir, storage) = temp_storage().await;

        let user = User::new("ada@example.com", "Ada", Role::Trainee);
        storage.save_user(&user).await.unwrap();

        let loaded = storage.load_user(user.id).await.unwrap().unwrap();
        assert_eq!(loaded.email, "ada@example.com");
        assert_eq!(loaded.role, Role::Trainee);

        assert!(storage.load_user(UserId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn modules_list_in_sequence_order() {
        let (_dir, storage) = temp_storage().await;

        let course = Course::new("Rust", "Intro");
        storage.save_course(&course).await.unwrap();

        // Saved out of order on purpose
        for order in [3u32, 1, 2] {
            let module = Module::new(
                course.id,
                format!("Module {}", order),
                ModuleKind::Video,
                order,
            );
            storage.save_module(&module).await.unwrap();
        }

        let modules = storage.list_modules(course.id).await.unwrap();
        let orders: Vec<u32> = modules.iter().map(|m| m.sequence_order).collect();
        assert_eq!(orders, vec![1, 2, 3]);

        // Modules of other courses stay out
        let other = Course::new("Go", "Intro");
        storage.save_course(&other).await.unwrap();
        storage
            .save_module(&Module::new(other.id, "Other", ModuleKind::Pdf, 1))
            .await
            .unwrap();
        assert_eq!(storage.list_modules(course.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn module_progress_upsert_overwrites() {
        let (_dir, storage) = temp_storage().await;

        let user_id = UserId::new();
        let module_id = ModuleId::new();
        let course_id = CourseId::new();
        let now = chrono::Utc::now();

        let mut progress = ModuleProgress::new(user_id, module_id, course_id, now);
        storage.save_module_progress(&progress).await.unwrap();

        progress.time_spent_minutes = 12;
        storage.save_module_progress(&progress).await.unwrap();

        let loaded = storage
            .load_module_progress(user_id, module_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.time_spent_minutes, 12);

        // One row per (user, module)
        let rows = storage.list_module_progress(user_id, course_id).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn standings_replace_wholesale() {
        let (_dir, storage) = temp_storage().await;

        let now = chrono::Utc::now();
        let standing = UserStanding {
            user_id: UserId::new(),
            course_id: None,
            total_points: 10,
            modules_completed: 1,
            time_spent_minutes: 30,
            correct_answers: 4,
            total_answers: 5,
            weighted_score: 64.0,
            rank: 1,
            calculated_at: now,
        };
        storage
            .replace_user_standings(None, std::slice::from_ref(&standing))
            .await
            .unwrap();
        assert_eq!(storage.list_user_standings(None).await.unwrap().len(), 1);

        // Replacing with an empty board clears it
        storage.replace_user_standings(None, &[]).await.unwrap();
        assert!(storage.list_user_standings(None).await.unwrap().is_empty());

        // Course boards are independent of the global board
        let course_id = CourseId::new();
        storage
            .replace_user_standings(Some(course_id), &[standing])
            .await
            .unwrap();
        assert!(storage.list_user_standings(None).await.unwrap().is_empty());
        assert_eq!(
            storage
                .list_user_standings(Some(course_id))
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
