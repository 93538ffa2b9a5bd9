//! The paper collection store.
//!
//! All mutations are expressed as pure functions of
//! (current collection, arguments) -> new collection, so no operation can
//! leave the collection half-mutated. [`PaperStore`] applies those
//! functions under a write lock, replaces the collection atomically, and
//! mirrors every successful mutation to the injected [`PersistencePort`].
//!
//! Unknown paper or task ids are silent no-ops throughout: retrying a
//! delete or toggle that already happened must not be an error.

use std::sync::Arc;
use std::sync::Mutex;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;

use crate::model::{PriorityLevel, Task, TaskSet, PAPER_THEME_COLORS};
use crate::persist::PersistencePort;

/// Validation failures, rejected before any mutation happens.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("task description cannot be empty")]
    EmptyText,
    #[error("paper title cannot be empty")]
    EmptyTitle,
}

/// Sort papers newest-first by creation timestamp, the collection-level
/// display order.
pub fn sorted_newest_first(mut papers: Vec<TaskSet>) -> Vec<TaskSet> {
    papers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    papers
}

/// Insert a batch of new papers, keeping the collection newest-first.
pub fn insert_papers(papers: &[TaskSet], batch: Vec<TaskSet>) -> Vec<TaskSet> {
    let mut next = batch;
    next.extend_from_slice(papers);
    sorted_newest_first(next)
}

/// Append one task to a paper. Unknown paper id is a no-op.
pub fn add_task(papers: &[TaskSet], set_id: &str, task: Task) -> Vec<TaskSet> {
    papers
        .iter()
        .map(|ts| {
            if ts.id == set_id {
                let mut ts = ts.clone();
                ts.tasks.push(task.clone());
                ts
            } else {
                ts.clone()
            }
        })
        .collect()
}

/// Append a batch of tasks to the end of a paper, preserving batch order.
pub fn append_tasks(papers: &[TaskSet], set_id: &str, tasks: &[Task]) -> Vec<TaskSet> {
    papers
        .iter()
        .map(|ts| {
            if ts.id == set_id {
                let mut ts = ts.clone();
                ts.tasks.extend_from_slice(tasks);
                ts
            } else {
                ts.clone()
            }
        })
        .collect()
}

/// Flip a task's completion flag in place, preserving order.
pub fn toggle_task(papers: &[TaskSet], set_id: &str, task_id: &str) -> Vec<TaskSet> {
    papers
        .iter()
        .map(|ts| {
            if ts.id == set_id {
                let mut ts = ts.clone();
                for task in &mut ts.tasks {
                    if task.id == task_id {
                        task.completed = !task.completed;
                    }
                }
                ts
            } else {
                ts.clone()
            }
        })
        .collect()
}

/// Replace the task with a matching id wholesale. Unknown ids no-op.
pub fn update_task(papers: &[TaskSet], set_id: &str, updated: &Task) -> Vec<TaskSet> {
    papers
        .iter()
        .map(|ts| {
            if ts.id == set_id {
                let mut ts = ts.clone();
                for task in &mut ts.tasks {
                    if task.id == updated.id {
                        *task = updated.clone();
                    }
                }
                ts
            } else {
                ts.clone()
            }
        })
        .collect()
}

/// Remove a task without reordering the remaining ones.
pub fn delete_task(papers: &[TaskSet], set_id: &str, task_id: &str) -> Vec<TaskSet> {
    papers
        .iter()
        .map(|ts| {
            if ts.id == set_id {
                let mut ts = ts.clone();
                ts.tasks.retain(|t| t.id != task_id);
                ts
            } else {
                ts.clone()
            }
        })
        .collect()
}

/// Remove a paper. Unknown id is a no-op.
pub fn delete_paper(papers: &[TaskSet], set_id: &str) -> Vec<TaskSet> {
    papers.iter().filter(|ts| ts.id != set_id).cloned().collect()
}

/// Set a paper's title. The caller has already validated it non-empty.
pub fn rename_paper(papers: &[TaskSet], set_id: &str, new_title: &str) -> Vec<TaskSet> {
    papers
        .iter()
        .map(|ts| {
            if ts.id == set_id {
                let mut ts = ts.clone();
                ts.title = new_title.to_string();
                ts
            } else {
                ts.clone()
            }
        })
        .collect()
}

/// Owned store for the paper collection with write-through persistence.
pub struct PaperStore {
    papers: RwLock<Vec<TaskSet>>,
    persistence: Arc<dyn PersistencePort>,
    rng: Mutex<StdRng>,
}

impl PaperStore {
    /// Create a store over the given persistence backend.
    pub fn new(persistence: Arc<dyn PersistencePort>) -> Self {
        Self::with_rng(persistence, StdRng::from_entropy())
    }

    /// Create a store with a fixed RNG seed, so theme-color assignment is
    /// deterministic under test.
    pub fn with_seed(persistence: Arc<dyn PersistencePort>, seed: u64) -> Self {
        Self::with_rng(persistence, StdRng::seed_from_u64(seed))
    }

    fn with_rng(persistence: Arc<dyn PersistencePort>, rng: StdRng) -> Self {
        Self {
            papers: RwLock::new(Vec::new()),
            persistence,
            rng: Mutex::new(rng),
        }
    }

    /// Replace the in-memory collection with the persisted one.
    pub async fn hydrate(&self) {
        let loaded = self.persistence.load().await;
        *self.papers.write().await = loaded;
    }

    /// Clone of the full collection, newest-first.
    pub async fn list(&self) -> Vec<TaskSet> {
        self.papers.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.papers.read().await.len()
    }

    pub async fn get(&self, set_id: &str) -> Option<TaskSet> {
        self.papers
            .read()
            .await
            .iter()
            .find(|ts| ts.id == set_id)
            .cloned()
    }

    /// Pick a random palette entry for a new paper.
    pub fn pick_theme_color(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        PAPER_THEME_COLORS[rng.gen_range(0..PAPER_THEME_COLORS.len())].to_string()
    }

    /// Create a paper, randomly themed unless a palette entry is supplied.
    pub async fn create_paper(
        &self,
        title: &str,
        theme_color: Option<String>,
    ) -> Result<TaskSet, StoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::EmptyTitle);
        }

        let color = theme_color.unwrap_or_else(|| self.pick_theme_color());
        let paper = TaskSet::new(title, color);
        self.mutate(|papers| insert_papers(papers, vec![paper.clone()]))
            .await;
        Ok(paper)
    }

    /// Insert a batch of already-assembled papers (AI generation).
    pub async fn insert_papers(&self, batch: Vec<TaskSet>) {
        self.mutate(|papers| insert_papers(papers, batch.clone()))
            .await;
    }

    /// Append a task to a paper. Returns the created task, or `None` when
    /// the paper does not exist.
    pub async fn add_task(
        &self,
        set_id: &str,
        text: &str,
        priority: PriorityLevel,
        due_date: NaiveDate,
    ) -> Result<Option<Task>, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyText);
        }

        if self.get(set_id).await.is_none() {
            return Ok(None);
        }

        let task = Task::new(text, priority, due_date);
        self.mutate(|papers| add_task(papers, set_id, task.clone()))
            .await;
        Ok(Some(task))
    }

    /// Append a batch of tasks (AI augmentation) to the end of a paper.
    pub async fn append_tasks(&self, set_id: &str, tasks: Vec<Task>) {
        self.mutate(|papers| append_tasks(papers, set_id, &tasks))
            .await;
    }

    pub async fn toggle_task(&self, set_id: &str, task_id: &str) {
        self.mutate(|papers| toggle_task(papers, set_id, task_id))
            .await;
    }

    /// Replace a task wholesale, keyed by its id.
    pub async fn update_task(&self, set_id: &str, task: Task) -> Result<(), StoreError> {
        if task.text.trim().is_empty() {
            return Err(StoreError::EmptyText);
        }
        self.mutate(|papers| update_task(papers, set_id, &task))
            .await;
        Ok(())
    }

    pub async fn delete_task(&self, set_id: &str, task_id: &str) {
        self.mutate(|papers| delete_task(papers, set_id, task_id))
            .await;
    }

    pub async fn delete_paper(&self, set_id: &str) {
        self.mutate(|papers| delete_paper(papers, set_id)).await;
    }

    pub async fn rename_paper(&self, set_id: &str, new_title: &str) -> Result<(), StoreError> {
        let new_title = new_title.trim();
        if new_title.is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        self.mutate(|papers| rename_paper(papers, set_id, new_title))
            .await;
        Ok(())
    }

    /// Delete every paper.
    pub async fn clear(&self) {
        self.mutate(|_| Vec::new()).await;
    }

    /// Apply a pure collection transform atomically and mirror the result
    /// to persistence. Persistence failures are logged, never propagated;
    /// the in-memory collection is the source of truth.
    async fn mutate<F>(&self, op: F)
    where
        F: FnOnce(&[TaskSet]) -> Vec<TaskSet>,
    {
        let snapshot = {
            let mut papers = self.papers.write().await;
            let next = op(papers.as_slice());
            *papers = next;
            papers.clone()
        };

        if let Err(e) = self.persistence.save(&snapshot).await {
            tracing::error!("Failed to persist paper collection: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryStore;

    fn due(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    async fn store() -> (PaperStore, Arc<MemoryStore>) {
        let persistence = Arc::new(MemoryStore::new());
        (PaperStore::with_seed(persistence.clone(), 7), persistence)
    }

    #[tokio::test]
    async fn test_create_then_update_preserves_id() {
        let (store, _) = store().await;
        let paper = store.create_paper("Chores", None).await.unwrap();
        let task = store
            .add_task(&paper.id, "Mow lawn", PriorityLevel::Low, due(1))
            .await
            .unwrap()
            .unwrap();

        let mut changed = task.clone();
        changed.text = "Mow the back lawn".to_string();
        changed.priority = PriorityLevel::High;
        changed.due_date = due(3);
        store.update_task(&paper.id, changed.clone()).await.unwrap();

        let stored = store.get(&paper.id).await.unwrap();
        assert_eq!(stored.tasks.len(), 1);
        assert_eq!(stored.tasks[0].id, task.id);
        assert_eq!(stored.tasks[0], changed);
    }

    #[tokio::test]
    async fn test_toggle_is_involution_and_preserves_order() {
        let (store, _) = store().await;
        let paper = store.create_paper("Errands", None).await.unwrap();
        let a = store
            .add_task(&paper.id, "A", PriorityLevel::Medium, due(1))
            .await
            .unwrap()
            .unwrap();
        let b = store
            .add_task(&paper.id, "B", PriorityLevel::Medium, due(2))
            .await
            .unwrap()
            .unwrap();
        store.toggle_task(&paper.id, &b.id).await;

        store.toggle_task(&paper.id, &a.id).await;
        let stored = store.get(&paper.id).await.unwrap();
        assert_eq!(
            stored.tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            vec![a.id.as_str(), b.id.as_str()]
        );
        assert!(stored.tasks[0].completed);
        assert!(stored.tasks[1].completed);

        store.toggle_task(&paper.id, &a.id).await;
        let stored = store.get(&paper.id).await.unwrap();
        assert!(!stored.tasks[0].completed);
    }

    #[tokio::test]
    async fn test_delete_absent_task_is_noop() {
        let (store, _) = store().await;
        let paper = store.create_paper("Errands", None).await.unwrap();
        store
            .add_task(&paper.id, "A", PriorityLevel::Low, due(1))
            .await
            .unwrap();

        let before = store.list().await;
        store.delete_task(&paper.id, "no-such-task").await;
        store.delete_task("no-such-paper", "whatever").await;
        assert_eq!(store.list().await, before);
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_mutation() {
        let (store, persistence) = store().await;
        let paper = store.create_paper("Errands", None).await.unwrap();

        let err = store
            .add_task(&paper.id, "   ", PriorityLevel::Low, due(1))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::EmptyText);
        assert!(store.get(&paper.id).await.unwrap().tasks.is_empty());
        assert!(persistence.snapshot().await[0].tasks.is_empty());
    }

    #[tokio::test]
    async fn test_rename_to_blank_rejected() {
        let (store, _) = store().await;
        let paper = store.create_paper("Errands", None).await.unwrap();

        let err = store.rename_paper(&paper.id, "  ").await.unwrap_err();
        assert_eq!(err, StoreError::EmptyTitle);
        assert_eq!(store.get(&paper.id).await.unwrap().title, "Errands");

        store.rename_paper(&paper.id, " Weekend ").await.unwrap();
        assert_eq!(store.get(&paper.id).await.unwrap().title, "Weekend");
    }

    #[tokio::test]
    async fn test_papers_listed_newest_first() {
        let (store, _) = store().await;
        let mut old = TaskSet::new("Old", "bg-sky-400");
        old.created_at = 100;
        let mut mid = TaskSet::new("Mid", "bg-sky-400");
        mid.created_at = 200;
        let mut new = TaskSet::new("New", "bg-sky-400");
        new.created_at = 300;
        store.insert_papers(vec![old, new, mid]).await;

        let titles: Vec<String> = store.list().await.into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["New", "Mid", "Old"]);
    }

    #[tokio::test]
    async fn test_theme_color_comes_from_palette_and_seed() {
        let persistence = Arc::new(MemoryStore::new());
        let a = PaperStore::with_seed(persistence.clone(), 42);
        let b = PaperStore::with_seed(persistence.clone(), 42);

        let colors_a: Vec<String> = (0..4).map(|_| a.pick_theme_color()).collect();
        let colors_b: Vec<String> = (0..4).map(|_| b.pick_theme_color()).collect();
        assert_eq!(colors_a, colors_b);
        for color in colors_a {
            assert!(PAPER_THEME_COLORS.contains(&color.as_str()));
        }
    }

    #[tokio::test]
    async fn test_every_mutation_persists_full_collection() {
        let (store, persistence) = store().await;
        let paper = store.create_paper("Errands", None).await.unwrap();
        assert_eq!(persistence.snapshot().await.len(), 1);

        store
            .add_task(&paper.id, "A", PriorityLevel::Low, due(1))
            .await
            .unwrap();
        assert_eq!(persistence.snapshot().await[0].tasks.len(), 1);

        store.clear().await;
        assert!(persistence.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_hydrate_restores_persisted_state() {
        let persistence = Arc::new(MemoryStore::new());
        let first = PaperStore::with_seed(persistence.clone(), 1);
        first.create_paper("Kept", None).await.unwrap();

        let second = PaperStore::with_seed(persistence.clone(), 2);
        second.hydrate().await;
        assert_eq!(second.list().await[0].title, "Kept");
    }
}
