//! Sequential module gating.
//!
//! A module is unlocked for a user iff every mandatory module earlier in the
//! course sequence is completed. Optional modules never gate anything. The
//! computation is a pure function of catalog + progress state; the
//! `is_locked` field stored on progress rows is only a cache of it.

use std::collections::HashMap;
use std::sync::Arc;
use serde::Serialize;
use traintrack_core::{
    CourseId, Module, ModuleId, ModuleProgress, ProgressStatus, TrackError, UserId,
};
use traintrack_storage::Storage;

/// One module's gate state for a user, with its progress summary.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleAccess {
    /// The module
    pub module: Module,
    /// Whether the sequencer currently gates it
    pub locked: bool,
    /// The user's status in it
    pub status: ProgressStatus,
    /// The user's completion percentage in it
    pub completion_percentage: u8,
    /// The user's accumulated time in it
    pub time_spent_minutes: u32,
}

/// Compute the unlock state of each module.
///
/// `modules` must be ordered by sequence_order; the result is parallel to it.
/// The first module carries no predecessors and is always unlocked.
pub fn unlock_states(
    modules: &[Module],
    progress: &HashMap<ModuleId, ModuleProgress>,
) -> Vec<bool> {
    let mut states = Vec::with_capacity(modules.len());
    let mut gate_open = true;
    for module in modules {
        states.push(gate_open);
        let completed = progress
            .get(&module.id)
            .map(|p| p.status.is_completed())
            .unwrap_or(false);
        if module.is_mandatory && !completed {
            gate_open = false;
        }
    }
    states
}

/// Storage-backed sequencer service.
pub struct Sequencer<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> Sequencer<S> {
    /// Create a new sequencer.
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Whether `module_id` is currently unlocked for `user_id`.
    pub async fn is_unlocked(
        &self,
        user_id: UserId,
        module_id: ModuleId,
    ) -> Result<bool, TrackError> {
        let module = self
            .storage
            .load_module(module_id)
            .await?
            .ok_or_else(|| TrackError::not_found("module", module_id))?;
        self.storage
            .load_user(user_id)
            .await?
            .ok_or_else(|| TrackError::not_found("user", user_id))?;

        let modules = self.storage.list_modules(module.course_id).await?;
        let progress = self.progress_by_module(user_id, module.course_id).await?;
        let states = unlock_states(&modules, &progress);

        Ok(modules
            .iter()
            .position(|m| m.id == module_id)
            .map(|i| states[i])
            .unwrap_or(false))
    }

    /// The user's view of a course: every module in sequence order with its
    /// gate state and progress summary.
    pub async fn list_accessible_modules(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ModuleAccess>, TrackError> {
        self.storage
            .load_course(course_id)
            .await?
            .ok_or_else(|| TrackError::not_found("course", course_id))?;
        self.storage
            .load_user(user_id)
            .await?
            .ok_or_else(|| TrackError::not_found("user", user_id))?;

        let modules = self.storage.list_modules(course_id).await?;
        let progress = self.progress_by_module(user_id, course_id).await?;
        let states = unlock_states(&modules, &progress);

        Ok(modules
            .into_iter()
            .zip(states)
            .map(|(module, unlocked)| {
                let row = progress.get(&module.id);
                ModuleAccess {
                    locked: !unlocked,
                    status: row.map(|p| p.status).unwrap_or_default(),
                    completion_percentage: row.map(|p| p.completion_percentage).unwrap_or(0),
                    time_spent_minutes: row.map(|p| p.time_spent_minutes).unwrap_or(0),
                    module,
                }
            })
            .collect())
    }

    async fn progress_by_module(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<HashMap<ModuleId, ModuleProgress>, TrackError> {
        let rows = self.storage.list_module_progress(user_id, course_id).await?;
        Ok(rows.into_iter().map(|p| (p.module_id, p)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use traintrack_core::{Course, ModuleKind};

    fn course_modules() -> (CourseId, Vec<Module>) {
        let course_id = CourseId::new();
        let mut m1 = Module::new(course_id, "M1", ModuleKind::Video, 1);
        m1.is_mandatory = true;
        let mut m2 = Module::new(course_id, "M2", ModuleKind::Pdf, 2);
        m2.is_mandatory = false;
        let mut m3 = Module::new(course_id, "M3", ModuleKind::Quiz, 3);
        m3.is_mandatory = true;
        (course_id, vec![m1, m2, m3])
    }

    fn completed_row(user_id: UserId, module: &Module) -> ModuleProgress {
        let now = Utc::now();
        let mut row = ModuleProgress::new(user_id, module.id, module.course_id, now);
        row.status = ProgressStatus::Completed;
        row.completion_percentage = 100;
        row.completed_at = Some(now);
        row
    }

    #[test]
    fn first_module_always_unlocked() {
        let (_, modules) = course_modules();
        let states = unlock_states(&modules, &HashMap::new());
        assert_eq!(states, vec![true, false, false]);
    }

    #[test]
    fn mandatory_predecessor_gates_until_completed() {
        let user_id = UserId::new();
        let (_, modules) = course_modules();

        // M1 done: M2 and M3 both open. M2 is optional and never gates M3.
        let mut progress = HashMap::new();
        let row = completed_row(user_id, &modules[0]);
        progress.insert(modules[0].id, row);

        let states = unlock_states(&modules, &progress);
        assert_eq!(states, vec![true, true, true]);
    }

    #[test]
    fn optional_module_does_not_gate() {
        let user_id = UserId::new();
        let (_, modules) = course_modules();

        // M2 done but M1 not: everything past M1 stays locked.
        let mut progress = HashMap::new();
        let row = completed_row(user_id, &modules[1]);
        progress.insert(modules[1].id, row);

        let states = unlock_states(&modules, &progress);
        assert_eq!(states, vec![true, false, false]);
    }

    #[tokio::test]
    async fn is_unlocked_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(
            traintrack_storage::JsonStorage::new(dir.path())
                .await
                .unwrap(),
        );
        let sequencer = Sequencer::new(storage.clone());

        let user = traintrack_core::User::new("t@example.com", "T", traintrack_core::Role::Trainee);
        storage.save_user(&user).await.unwrap();

        let err = sequencer
            .is_unlocked(user.id, ModuleId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TrackError::NotFound(_)));

        let course = Course::new("C", "");
        storage.save_course(&course).await.unwrap();
        let module = Module::new(course.id, "M", ModuleKind::Video, 1);
        storage.save_module(&module).await.unwrap();

        let err = sequencer
            .is_unlocked(UserId::new(), module.id)
            .await
            .unwrap_err();
        assert!(matches!(err, TrackError::NotFound(_)));

        assert!(sequencer.is_unlocked(user.id, module.id).await.unwrap());
    }
}
