//! Durable storage for the paper collection.
//!
//! The full ordered collection is the unit of persistence: every save
//! serializes all papers and overwrites the stored document, every load
//! reads it back in one piece. The reader tolerates records written by
//! earlier versions of the app (missing theme color or timestamp, `tasks`
//! that is not an array) and degrades an unparseable document to an empty
//! collection rather than failing startup.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::model::{now_millis, Task, TaskSet, PAPER_THEME_COLORS};

/// Storage backend for the paper collection.
///
/// `load` is infallible by contract: storage problems are logged and
/// produce an empty collection instead of interrupting the user.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    async fn load(&self) -> Vec<TaskSet>;
    async fn save(&self, papers: &[TaskSet]) -> Result<(), std::io::Error>;
}

/// A paper record as found on disk, before normalization.
///
/// Only `id` and `title` are required; everything else gains a default so
/// documents written by older app versions keep loading.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    id: String,
    title: String,
    #[serde(default)]
    tasks: serde_json::Value,
    #[serde(default)]
    theme_color: Option<String>,
    #[serde(default)]
    created_at: Option<i64>,
}

impl StoredRecord {
    fn normalize(self) -> TaskSet {
        let tasks = match self.tasks {
            serde_json::Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<Task>(item) {
                    Ok(task) => Some(task),
                    Err(e) => {
                        tracing::warn!("Dropping unreadable task record: {}", e);
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        TaskSet {
            id: self.id,
            title: self.title,
            tasks,
            theme_color: self
                .theme_color
                .unwrap_or_else(|| PAPER_THEME_COLORS[0].to_string()),
            created_at: self.created_at.unwrap_or_else(now_millis),
        }
    }
}

/// Parse a stored document into normalized papers.
///
/// A document that fails to parse yields an empty collection; the caller
/// logs the reason.
fn parse_document(contents: &str) -> Result<Vec<TaskSet>, serde_json::Error> {
    let records: Vec<StoredRecord> = serde_json::from_str(contents)?;
    Ok(records.into_iter().map(StoredRecord::normalize).collect())
}

/// JSON-file-backed persistence at a fixed path.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl PersistencePort for JsonFileStore {
    async fn load(&self) -> Vec<TaskSet> {
        if !self.path.exists() {
            tracing::info!("No paper store at {}, starting empty", self.path.display());
            return Vec::new();
        }

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(
                    "Failed to read paper store {}: {}, starting empty",
                    self.path.display(),
                    e
                );
                return Vec::new();
            }
        };

        match parse_document(&contents) {
            Ok(papers) => {
                tracing::info!(
                    "Loaded {} papers from {}",
                    papers.len(),
                    self.path.display()
                );
                papers
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse paper store {}: {}, starting empty",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    async fn save(&self, papers: &[TaskSet]) -> Result<(), std::io::Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(papers)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        std::fs::write(&self.path, contents)?;
        tracing::debug!("Saved {} papers to {}", papers.len(), self.path.display());
        Ok(())
    }
}

/// In-memory persistence, used by tests in place of a real file.
#[derive(Default)]
pub struct MemoryStore {
    papers: RwLock<Vec<TaskSet>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current saved snapshot.
    pub async fn snapshot(&self) -> Vec<TaskSet> {
        self.papers.read().await.clone()
    }
}

#[async_trait]
impl PersistencePort for MemoryStore {
    async fn load(&self) -> Vec<TaskSet> {
        self.papers.read().await.clone()
    }

    async fn save(&self, papers: &[TaskSet]) -> Result<(), std::io::Error> {
        *self.papers.write().await = papers.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PriorityLevel;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample_paper() -> TaskSet {
        let mut paper = TaskSet::new("Groceries", "bg-sky-400");
        paper.tasks.push(Task::new(
            "Buy milk",
            PriorityLevel::High,
            NaiveDate::from_ymd_opt(2025, 5, 20).unwrap(),
        ));
        paper
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let temp = tempdir().unwrap();
        let store = JsonFileStore::new(temp.path().join("papers.json"));

        let papers = vec![sample_paper()];
        store.save(&papers).await.unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded, papers);
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let temp = tempdir().unwrap();
        let store = JsonFileStore::new(temp.path().join("papers.json"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_document_loads_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("papers.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonFileStore::new(path);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_legacy_record_gains_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("papers.json");
        std::fs::write(&path, r#"[{"id":"x","title":"Old"}]"#).unwrap();

        let store = JsonFileStore::new(path);
        let loaded = store.load().await;

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "x");
        assert_eq!(loaded[0].title, "Old");
        assert!(loaded[0].tasks.is_empty());
        assert_eq!(loaded[0].theme_color, PAPER_THEME_COLORS[0]);
        assert!(loaded[0].created_at > 0);
    }

    #[tokio::test]
    async fn test_non_array_tasks_coerced_to_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("papers.json");
        std::fs::write(
            &path,
            r#"[{"id":"x","title":"Old","tasks":"oops","themeColor":"bg-rose-400","createdAt":5}]"#,
        )
        .unwrap();

        let store = JsonFileStore::new(path);
        let loaded = store.load().await;

        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].tasks.is_empty());
        assert_eq!(loaded[0].theme_color, "bg-rose-400");
        assert_eq!(loaded[0].created_at, 5);
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_document() {
        let temp = tempdir().unwrap();
        let store = JsonFileStore::new(temp.path().join("papers.json"));

        store.save(&[sample_paper(), sample_paper()]).await.unwrap();
        store.save(&[]).await.unwrap();

        assert!(store.load().await.is_empty());
    }
}
