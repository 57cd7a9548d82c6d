//! Task storage: the in-memory forest mirrored to a JSON file.
//!
//! Every mutating call returns only after the new forest has been written to
//! disk. The new forest is built on a copy and published only once the write
//! succeeded, so readers (the reminder scan included) never observe a
//! half-applied change and a failed save leaves memory untouched.

mod file;
mod forest;

pub use file::PersistenceError;
pub use forest::{Forest, PreOrder, StatusCounts, Walk};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::task::{NodeRef, Task, TaskId, TaskPath, ValidationError};

/// Errors returned by [`TaskStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Task not found: {0}")]
    NotFound(NodeRef),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
    forest: RwLock<Forest>,
    /// Serializes mutations so clone-modify-save-publish cannot interleave.
    persist_lock: Mutex<()>,
}

impl TaskStore {
    /// Open the store at `path`, loading whatever is there.
    ///
    /// A missing file starts an empty forest. An unreadable or unparseable
    /// file also starts empty, after a copy is kept at `<path>.corrupt`.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let roots = match file::load(&path).await {
            Ok(Some(roots)) => {
                tracing::info!("Loaded {} root tasks from {}", roots.len(), path.display());
                roots
            }
            Ok(None) => {
                tracing::info!(
                    "No task store found at {}, starting empty",
                    path.display()
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("{}, starting with an empty task list", e);
                if let Some(backup) = file::quarantine(&path).await {
                    tracing::warn!("Unreadable task store kept at {}", backup.display());
                }
                Vec::new()
            }
        };

        Self {
            path,
            forest: RwLock::new(Forest::from_roots(roots)),
            persist_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a new root-level task.
    pub async fn create_task(
        &self,
        text: impl Into<String>,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Task, StoreError> {
        self.create_task_at(text, deadline, Utc::now()).await
    }

    pub async fn create_task_at(
        &self,
        text: impl Into<String>,
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Task, StoreError> {
        let task = Task::new(text, deadline, now)?;
        let created = task.clone();
        let path = self
            .mutate(move |forest| Ok(forest.push_root(task)))
            .await?;
        tracing::info!(id = %created.id(), path = %path, "Created task");
        Ok(created)
    }

    /// Append a new subtask as the last child of `parent`.
    pub async fn create_subtask(
        &self,
        parent: impl Into<NodeRef>,
        text: impl Into<String>,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<Task, StoreError> {
        self.create_subtask_at(parent, text, deadline, Utc::now())
            .await
    }

    pub async fn create_subtask_at(
        &self,
        parent: impl Into<NodeRef>,
        text: impl Into<String>,
        deadline: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Task, StoreError> {
        let parent = parent.into();
        let task = Task::new(text, deadline, now)?;
        let created = task.clone();
        let path = self
            .mutate(move |forest| forest.push_child(&parent, task))
            .await?;
        tracing::info!(id = %created.id(), path = %path, "Created subtask");
        Ok(created)
    }

    /// Replace a task's text. Nothing else changes.
    pub async fn edit_text(
        &self,
        node: impl Into<NodeRef>,
        text: impl Into<String>,
    ) -> Result<(), StoreError> {
        let node = node.into();
        let text = text.into();
        self.mutate(|forest| forest.edit_text(&node, text)).await?;
        tracing::debug!("Edited text of {}", node);
        Ok(())
    }

    /// Flip Pending <-> Completed. Returns the updated task.
    pub async fn toggle_status(&self, node: impl Into<NodeRef>) -> Result<Task, StoreError> {
        let node = node.into();
        let task = self
            .mutate(|forest| forest.toggle_status(&node).map(Task::clone))
            .await?;
        tracing::debug!(id = %task.id(), status = ?task.status(), "Toggled status");
        Ok(task)
    }

    /// Remove a node and its whole subtree. Returns the removed task.
    pub async fn delete_node(&self, node: impl Into<NodeRef>) -> Result<Task, StoreError> {
        let node = node.into();
        let removed = self.mutate(|forest| forest.remove(&node)).await?;
        tracing::info!(id = %removed.id(), "Deleted task and its subtasks");
        Ok(removed)
    }

    /// Read-only lookup.
    pub async fn resolve(&self, node: impl Into<NodeRef>) -> Result<Task, StoreError> {
        let node = node.into();
        self.forest.read().await.resolve(&node).cloned()
    }

    /// Current position of a task, if it still exists.
    pub async fn path_of(&self, id: TaskId) -> Option<TaskPath> {
        self.forest.read().await.locate(&NodeRef::Id(id))
    }

    /// Root-level tasks with their full subtask structure.
    pub async fn list_roots(&self) -> Vec<Task> {
        self.forest.read().await.roots().to_vec()
    }

    pub async fn count_by_status(&self) -> StatusCounts {
        self.forest.read().await.count_by_status()
    }

    /// Detached copy of the current forest. Later mutations do not affect it.
    pub async fn snapshot(&self) -> Forest {
        self.forest.read().await.clone()
    }

    /// Run `f` against a consistent view of the forest without cloning it.
    pub async fn read<R>(&self, f: impl FnOnce(&Forest) -> R) -> R {
        let forest = self.forest.read().await;
        f(&forest)
    }

    /// Write the current forest to disk.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let _guard = self.persist_lock.lock().await;
        let forest = self.forest.read().await;
        file::save(&self.path, forest.roots()).await?;
        Ok(())
    }

    /// Hold the forest exclusively, stalling every reader until dropped.
    #[cfg(test)]
    pub(crate) async fn lock_exclusive(&self) -> tokio::sync::RwLockWriteGuard<'_, Forest> {
        self.forest.write().await
    }

    async fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Forest) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let _guard = self.persist_lock.lock().await;
        let mut next = self.forest.read().await.clone();
        let out = f(&mut next)?;
        file::save(&self.path, next.roots()).await?;
        *self.forest.write().await = next;
        Ok(out)
    }
}

/// Shared task store wrapped in Arc for concurrent access.
pub type SharedTaskStore = Arc<TaskStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use chrono::Duration;

    async fn open_temp() -> (tempfile::TempDir, TaskStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = TaskStore::open(temp.path().join("tasks.json")).await;
        (temp, store)
    }

    fn root(i: usize) -> TaskPath {
        TaskPath::root(i)
    }

    fn path(s: &str) -> TaskPath {
        s.parse().expect("path")
    }

    #[tokio::test]
    async fn create_then_resolve_returns_exact_fields() {
        let (_temp, store) = open_temp().await;
        let deadline = Utc::now() + Duration::days(5);

        let created = store
            .create_task("Write the quarterly report", Some(deadline))
            .await
            .expect("create");

        let by_path = store.resolve(root(0)).await.expect("resolve by path");
        let by_id = store.resolve(created.id()).await.expect("resolve by id");
        assert_eq!(by_path, created);
        assert_eq!(by_id, created);
        assert_eq!(by_path.status(), TaskStatus::Pending);
        assert_eq!(by_path.text(), "Write the quarterly report");
        assert_eq!(by_path.deadline(), Some(deadline));
    }

    #[tokio::test]
    async fn empty_text_fails_without_writing() {
        let (temp, store) = open_temp().await;
        let err = store
            .create_task("   ", Some(Utc::now() + Duration::days(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::EmptyText)));
        assert!(store.list_roots().await.is_empty());
        assert!(!temp.path().join("tasks.json").exists());
    }

    #[tokio::test]
    async fn past_deadline_is_rejected() {
        let (_temp, store) = open_temp().await;
        let err = store
            .create_task("late", Some(Utc::now() - Duration::hours(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::DeadlineNotInFuture { .. })
        ));
    }

    #[tokio::test]
    async fn subtask_under_missing_parent_is_not_found() {
        let (_temp, store) = open_temp().await;
        store.create_task("only", None).await.unwrap();
        let err = store
            .create_subtask(path("0.3"), "child", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(store.resolve(root(0)).await.unwrap().subtasks().is_empty());
    }

    #[tokio::test]
    async fn subtasks_append_in_order() {
        let (_temp, store) = open_temp().await;
        let parent = store.create_task("parent", None).await.unwrap();
        store.create_subtask(root(0), "first", None).await.unwrap();
        store.create_subtask(parent.id(), "second", None).await.unwrap();
        store.create_subtask(path("0.1"), "nested", None).await.unwrap();

        let parent = store.resolve(root(0)).await.unwrap();
        let texts: Vec<_> = parent.subtasks().iter().map(|t| t.text()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(
            store.resolve(path("0.1.0")).await.unwrap().text(),
            "nested"
        );
    }

    #[tokio::test]
    async fn edit_text_changes_only_text() {
        let (_temp, store) = open_temp().await;
        let deadline = Utc::now() + Duration::days(3);
        let before = store.create_task("draft", Some(deadline)).await.unwrap();

        store.edit_text(root(0), "final").await.unwrap();
        let after = store.resolve(root(0)).await.unwrap();
        assert_eq!(after.text(), "final");
        assert_eq!(after.id(), before.id());
        assert_eq!(after.deadline(), before.deadline());
        assert_eq!(after.created_at(), before.created_at());
        assert_eq!(after.status(), before.status());

        assert!(matches!(
            store.edit_text(root(0), "").await,
            Err(StoreError::Validation(ValidationError::EmptyText))
        ));
        assert!(matches!(
            store.edit_text(root(4), "x").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn toggle_twice_restores_task() {
        let (_temp, store) = open_temp().await;
        let original = store.create_task("flip", None).await.unwrap();

        let toggled = store.toggle_status(root(0)).await.unwrap();
        assert_eq!(toggled.status(), TaskStatus::Completed);
        let restored = store.toggle_status(root(0)).await.unwrap();
        assert_eq!(restored, original);
    }

    #[tokio::test]
    async fn delete_removes_subtree_and_keeps_count_invariant() {
        let (_temp, store) = open_temp().await;
        store.create_task("a", None).await.unwrap();
        store.create_task("b", None).await.unwrap();
        store.create_subtask(root(0), "a0", None).await.unwrap();
        let deep = store.create_subtask(path("0.0"), "a00", None).await.unwrap();
        store.create_subtask(root(0), "a1", None).await.unwrap();
        store.toggle_status(path("0.1")).await.unwrap();

        let counts = store.count_by_status().await;
        assert_eq!(counts, StatusCounts { pending: 4, completed: 1 });

        let removed = store.delete_node(path("0.0")).await.unwrap();
        assert_eq!(removed.text(), "a0");
        assert_eq!(store.resolve(root(0)).await.unwrap().subtasks().len(), 1);
        assert!(matches!(
            store.resolve(deep.id()).await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.count_by_status().await.total(), 3);

        store.delete_node(root(0)).await.unwrap();
        let roots = store.list_roots().await;
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].text(), "b");
        assert!(matches!(
            store.delete_node(root(1)).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn mutations_survive_reopen() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("tasks.json");
        let deadline = Utc::now() + Duration::days(9);
        {
            let store = TaskStore::open(&file).await;
            store.create_task("keep", Some(deadline)).await.unwrap();
            store.create_subtask(root(0), "child", None).await.unwrap();
            store.toggle_status(path("0.0")).await.unwrap();
        }

        let reopened = TaskStore::open(&file).await;
        let roots = reopened.list_roots().await;
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].deadline(), Some(deadline));
        assert_eq!(roots[0].subtasks()[0].status(), TaskStatus::Completed);
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty_and_is_backed_up() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("tasks.json");
        std::fs::write(&file, "[{\"broken\":").unwrap();

        let store = TaskStore::open(&file).await;
        assert!(store.list_roots().await.is_empty());
        assert!(temp.path().join("tasks.json.corrupt").exists());
    }

    #[tokio::test]
    async fn failed_save_leaves_memory_unchanged() {
        let temp = tempfile::tempdir().expect("tempdir");
        // The parent "directory" is a regular file, so every save fails.
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let store = TaskStore::open(blocker.join("tasks.json")).await;

        let err = store.create_task("lost", None).await.unwrap_err();
        assert!(matches!(err, StoreError::Persistence(_)));
        assert!(store.list_roots().await.is_empty());
    }

    #[tokio::test]
    async fn deep_subtask_chain_survives_reopen() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("tasks.json");
        let store = TaskStore::open(&file).await;
        store.create_task("unrelated", None).await.unwrap();
        let mut deepest = store.create_task("top", None).await.unwrap().id();
        for level in 0..70 {
            deepest = store
                .create_subtask(deepest, format!("level {}", level), None)
                .await
                .unwrap()
                .id();
        }
        drop(store);

        let reopened = TaskStore::open(&file).await;
        assert_eq!(reopened.count_by_status().await.total(), 72);
        assert_eq!(reopened.list_roots().await[0].text(), "unrelated");
        let path = reopened.path_of(deepest).await.expect("deepest task");
        assert_eq!(path.depth(), 70);
        assert_eq!(reopened.resolve(deepest).await.unwrap().text(), "level 69");
        assert!(!temp.path().join("tasks.json.corrupt").exists());
    }

    #[tokio::test]
    async fn snapshot_is_detached_from_later_mutations() {
        let (_temp, store) = open_temp().await;
        let first = store.create_task("first", None).await.unwrap();

        let snapshot = store.snapshot().await;
        store.create_subtask(first.id(), "later", None).await.unwrap();
        store.create_task("second", None).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.roots()[0], first);
        assert!(snapshot.locate(&NodeRef::Id(first.id())).is_some());
        assert_eq!(store.count_by_status().await.total(), 3);
    }
}
