//! Application controller.
//!
//! `PaperService` sequences store mutations, persistence, AI generation
//! and export. Transient status is tracked per concern (one slot for
//! global generation, one per paper for augmentation, one for batch
//! export) so independent operations never share a loading flag or an
//! error message. AI output enters the collection through the same store
//! mutations user edits take.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::ai::{into_domain_task, AiError, PaperComposer};
use crate::export::{ExportError, ExportOutcome, Exporter};
use crate::model::{AiLanguage, PriorityLevel, Task, TaskSet};
use crate::store::{PaperStore, StoreError};

/// Errors surfaced by controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("theme cannot be empty")]
    EmptyTheme,

    #[error(transparent)]
    Validation(#[from] StoreError),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error(transparent)]
    Export(#[from] ExportError),

    /// The concern already has an operation in flight; there is no
    /// cancellation, only refusal to re-enter.
    #[error("{0} is already in progress")]
    Busy(&'static str),

    #[error("paper {0} not found")]
    NotFound(String),
}

/// State of one status slot.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ConcernStatus {
    #[default]
    Idle,
    Running,
    Failed {
        message: String,
    },
}

/// Snapshot of every status slot, for the front-end to poll.
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub generation: ConcernStatus,
    /// Augmentation status keyed by paper id. Papers never augmented (or
    /// whose last augmentation succeeded) are absent.
    pub augmentation: HashMap<String, ConcernStatus>,
    pub export: ConcernStatus,
}

/// Orchestrates user intents against the store, the AI composer and the
/// exporter.
pub struct PaperService {
    store: PaperStore,
    composer: PaperComposer,
    exporter: Exporter,
    generation: RwLock<ConcernStatus>,
    augmentation: RwLock<HashMap<String, ConcernStatus>>,
    export: RwLock<ConcernStatus>,
}

impl PaperService {
    pub fn new(store: PaperStore, composer: PaperComposer, exporter: Exporter) -> Self {
        Self {
            store,
            composer,
            exporter,
            generation: RwLock::new(ConcernStatus::Idle),
            augmentation: RwLock::new(HashMap::new()),
            export: RwLock::new(ConcernStatus::Idle),
        }
    }

    /// Load the persisted collection into memory. Called once at startup.
    pub async fn hydrate(&self) {
        self.store.hydrate().await;
    }

    pub async fn list_papers(&self) -> Vec<TaskSet> {
        self.store.list().await
    }

    pub async fn get_paper(&self, set_id: &str) -> Option<TaskSet> {
        self.store.get(set_id).await
    }

    /// Create an empty paper named after the current collection size.
    pub async fn add_blank_paper(&self) -> Result<TaskSet, ServiceError> {
        let title = format!("New Paper {}", self.store.count().await + 1);
        Ok(self.store.create_paper(&title, None).await?)
    }

    pub async fn add_task(
        &self,
        set_id: &str,
        text: &str,
        priority: PriorityLevel,
        due_date: NaiveDate,
    ) -> Result<Task, ServiceError> {
        self.store
            .add_task(set_id, text, priority, due_date)
            .await?
            .ok_or_else(|| ServiceError::NotFound(set_id.to_string()))
    }

    pub async fn toggle_task(&self, set_id: &str, task_id: &str) {
        self.store.toggle_task(set_id, task_id).await;
    }

    pub async fn update_task(&self, set_id: &str, task: Task) -> Result<(), ServiceError> {
        Ok(self.store.update_task(set_id, task).await?)
    }

    pub async fn delete_task(&self, set_id: &str, task_id: &str) {
        self.store.delete_task(set_id, task_id).await;
    }

    pub async fn delete_paper(&self, set_id: &str) {
        self.store.delete_paper(set_id).await;
    }

    pub async fn rename_paper(&self, set_id: &str, new_title: &str) -> Result<(), ServiceError> {
        Ok(self.store.rename_paper(set_id, new_title).await?)
    }

    pub async fn clear_papers(&self) {
        self.store.clear().await;
    }

    /// Generate one paper around a user-supplied theme.
    pub async fn generate_themed_paper(
        &self,
        theme: &str,
        language: AiLanguage,
    ) -> Result<TaskSet, ServiceError> {
        let theme = theme.trim();
        if theme.is_empty() {
            return Err(ServiceError::EmptyTheme);
        }

        self.begin(&self.generation, "AI generation").await?;
        let result = self.assemble_paper(theme, 3, 7, language).await;
        match result {
            Ok(paper) => {
                self.store.insert_papers(vec![paper.clone()]).await;
                self.settle(&self.generation, None).await;
                tracing::info!(title = %paper.title, tasks = paper.tasks.len(), "Generated themed paper");
                Ok(paper)
            }
            Err(e) => {
                self.settle(&self.generation, Some(e.to_string())).await;
                Err(e.into())
            }
        }
    }

    /// Generate `count` papers: one theme-suggestion round trip, then all
    /// task batches concurrently.
    ///
    /// The join is all-or-nothing: any failed fetch aborts the batch and
    /// nothing reaches the store, so there is no partial commit to clean
    /// up afterwards.
    pub async fn batch_generate(
        &self,
        count: u32,
        language: AiLanguage,
    ) -> Result<Vec<TaskSet>, ServiceError> {
        self.begin(&self.generation, "AI generation").await?;

        let result = async {
            let themes = self.composer.theme_suggestions(count, language).await?;
            let papers = futures::future::try_join_all(
                themes
                    .iter()
                    .map(|theme| self.assemble_paper(theme, 3, 7, language)),
            )
            .await?;
            Ok::<_, AiError>(papers)
        }
        .await;

        match result {
            Ok(papers) => {
                self.store.insert_papers(papers.clone()).await;
                self.settle(&self.generation, None).await;
                tracing::info!(count = papers.len(), "Batch-generated papers");
                Ok(papers)
            }
            Err(e) => {
                tracing::error!("Batch generation failed: {}", e);
                self.settle(&self.generation, Some(e.to_string())).await;
                Err(e.into())
            }
        }
    }

    /// Ask the model for extra tasks fitting an existing paper and append
    /// them. Status is tracked under that paper's id only.
    pub async fn augment_paper(
        &self,
        set_id: &str,
        language: AiLanguage,
    ) -> Result<Vec<Task>, ServiceError> {
        let paper = self
            .store
            .get(set_id)
            .await
            .ok_or_else(|| ServiceError::NotFound(set_id.to_string()))?;

        {
            let mut augmentation = self.augmentation.write().await;
            if matches!(augmentation.get(set_id), Some(ConcernStatus::Running)) {
                return Err(ServiceError::Busy("task suggestion"));
            }
            augmentation.insert(set_id.to_string(), ConcernStatus::Running);
        }

        let result = self
            .composer
            .supplemental_tasks(&paper.title, 3, 5, language)
            .await;

        match result {
            Ok(batch) => {
                let today = today();
                let tasks: Vec<Task> = batch.iter().map(|g| into_domain_task(g, today)).collect();
                self.store.append_tasks(set_id, tasks.clone()).await;
                self.augmentation.write().await.remove(set_id);
                Ok(tasks)
            }
            Err(e) => {
                self.augmentation.write().await.insert(
                    set_id.to_string(),
                    ConcernStatus::Failed {
                        message: e.to_string(),
                    },
                );
                Err(e.into())
            }
        }
    }

    /// Export one paper as an image file.
    pub async fn export_paper(&self, set_id: &str) -> Result<PathBuf, ServiceError> {
        let paper = self
            .store
            .get(set_id)
            .await
            .ok_or_else(|| ExportError::TargetNotFound(set_id.to_string()))?;
        Ok(self.exporter.capture(&paper).await?)
    }

    /// Export every paper sequentially. Per-item failures are reported in
    /// the outcomes; the batch itself only fails to start, never midway.
    pub async fn export_all(&self) -> Result<Vec<ExportOutcome>, ServiceError> {
        self.begin(&self.export, "batch export").await?;

        let papers = self.store.list().await;
        let outcomes = self.exporter.capture_all(&papers).await;

        let first_error = outcomes.iter().find_map(|o| o.error.clone());
        self.settle(&self.export, first_error).await;
        Ok(outcomes)
    }

    /// Current state of every status slot.
    pub async fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            generation: self.generation.read().await.clone(),
            augmentation: self.augmentation.read().await.clone(),
            export: self.export.read().await.clone(),
        }
    }

    /// Fetch a task batch for `theme` and assemble a new themed paper.
    async fn assemble_paper(
        &self,
        theme: &str,
        min_count: u32,
        max_count: u32,
        language: AiLanguage,
    ) -> Result<TaskSet, AiError> {
        let batch = self
            .composer
            .themed_task_batch(theme, min_count, max_count, language)
            .await?;

        let today = today();
        let mut paper = TaskSet::new(theme, self.store.pick_theme_color());
        paper.tasks = batch.iter().map(|g| into_domain_task(g, today)).collect();
        Ok(paper)
    }

    /// Mark a concern running, refusing re-entry.
    async fn begin(
        &self,
        slot: &RwLock<ConcernStatus>,
        concern: &'static str,
    ) -> Result<(), ServiceError> {
        let mut status = slot.write().await;
        if *status == ConcernStatus::Running {
            return Err(ServiceError::Busy(concern));
        }
        *status = ConcernStatus::Running;
        Ok(())
    }

    /// Mark a concern idle or failed once its operation finishes.
    async fn settle(&self, slot: &RwLock<ConcernStatus>, error: Option<String>) {
        let mut status = slot.write().await;
        *status = match error {
            Some(message) => ConcernStatus::Failed { message },
            None => ConcernStatus::Idle,
        };
    }
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
