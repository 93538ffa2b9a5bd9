//! API endpoints for papers and their tasks.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{AiLanguage, PriorityLevel, Task, TaskSet};

use super::routes::{error_response, AppState};

/// Create the paper API routes, nested under `/api/papers`.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_papers).post(add_blank_paper).delete(clear_papers))
        .route("/generate", post(generate_paper))
        .route("/batch-generate", post(batch_generate))
        .route("/:id", get(get_paper).delete(delete_paper))
        .route("/:id/title", put(rename_paper))
        .route("/:id/tasks", post(add_task))
        .route("/:id/tasks/:task_id", put(update_task).delete(delete_task))
        .route("/:id/tasks/:task_id/toggle", post(toggle_task))
        .route("/:id/augment", post(augment_paper))
        .route("/:id/export", post(export_paper))
}

/// Request to generate a paper around a user-supplied theme.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub theme: String,
    #[serde(default)]
    pub language: AiLanguage,
}

/// Request to generate several papers with AI-suggested themes.
#[derive(Debug, Deserialize)]
pub struct BatchGenerateRequest {
    pub count: u32,
    #[serde(default)]
    pub language: AiLanguage,
}

/// Request to add a task to a paper.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub text: String,
    pub priority: PriorityLevel,
    pub due_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct AugmentRequest {
    #[serde(default)]
    pub language: AiLanguage,
}

/// Response after exporting one paper.
#[derive(Debug, Serialize)]
pub struct ExportResponse {
    pub file: String,
}

/// GET /api/papers
/// Full collection, newest-first.
async fn list_papers(State(state): State<Arc<AppState>>) -> Json<Vec<TaskSet>> {
    Json(state.papers.list_papers().await)
}

/// POST /api/papers
/// Add an empty paper.
async fn add_blank_paper(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TaskSet>, (StatusCode, String)> {
    state
        .papers
        .add_blank_paper()
        .await
        .map(Json)
        .map_err(error_response)
}

/// DELETE /api/papers
/// Delete every paper.
async fn clear_papers(State(state): State<Arc<AppState>>) -> StatusCode {
    state.papers.clear_papers().await;
    StatusCode::NO_CONTENT
}

/// POST /api/papers/generate
/// Generate one paper around the supplied theme.
async fn generate_paper(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<TaskSet>, (StatusCode, String)> {
    state
        .papers
        .generate_themed_paper(&req.theme, req.language)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /api/papers/batch-generate
/// Generate `count` papers with AI-suggested themes.
async fn batch_generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchGenerateRequest>,
) -> Result<Json<Vec<TaskSet>>, (StatusCode, String)> {
    state
        .papers
        .batch_generate(req.count, req.language)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /api/papers/:id
async fn get_paper(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskSet>, (StatusCode, String)> {
    state
        .papers
        .get_paper(&id)
        .await
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("paper {} not found", id)))
}

/// DELETE /api/papers/:id
/// Idempotent: deleting an unknown paper succeeds.
async fn delete_paper(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> StatusCode {
    state.papers.delete_paper(&id).await;
    StatusCode::NO_CONTENT
}

/// PUT /api/papers/:id/title
async fn rename_paper(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .papers
        .rename_paper(&id, &req.title)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

/// POST /api/papers/:id/tasks
async fn add_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<Task>, (StatusCode, String)> {
    state
        .papers
        .add_task(&id, &req.text, req.priority, req.due_date)
        .await
        .map(Json)
        .map_err(error_response)
}

/// PUT /api/papers/:id/tasks/:task_id
/// Replace a task wholesale. The path id wins over any id in the body.
async fn update_task(
    State(state): State<Arc<AppState>>,
    Path((id, task_id)): Path<(String, String)>,
    Json(mut task): Json<Task>,
) -> Result<StatusCode, (StatusCode, String)> {
    task.id = task_id;
    state
        .papers
        .update_task(&id, task)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

/// DELETE /api/papers/:id/tasks/:task_id
/// Idempotent, like paper deletion.
async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path((id, task_id)): Path<(String, String)>,
) -> StatusCode {
    state.papers.delete_task(&id, &task_id).await;
    StatusCode::NO_CONTENT
}

/// POST /api/papers/:id/tasks/:task_id/toggle
async fn toggle_task(
    State(state): State<Arc<AppState>>,
    Path((id, task_id)): Path<(String, String)>,
) -> StatusCode {
    state.papers.toggle_task(&id, &task_id).await;
    StatusCode::NO_CONTENT
}

/// POST /api/papers/:id/augment
/// Append AI-suggested tasks fitting the paper's title.
async fn augment_paper(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AugmentRequest>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    state
        .papers
        .augment_paper(&id, req.language)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /api/papers/:id/export
async fn export_paper(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ExportResponse>, (StatusCode, String)> {
    state
        .papers
        .export_paper(&id)
        .await
        .map(|path| {
            Json(ExportResponse {
                file: path.display().to_string(),
            })
        })
        .map_err(error_response)
}
