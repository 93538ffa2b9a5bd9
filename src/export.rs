//! Image export of papers through an external rendering collaborator.
//!
//! Rendering itself is somebody else's job: the collaborator receives a
//! paper and a background color and returns an image data URL. This module
//! owns the orchestration around it: settle delays before capture,
//! strictly sequential batch processing with a fixed inter-item pause, and
//! per-item failure reporting so one bad paper does not sink the batch.
//! Export never mutates the collection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::model::TaskSet;

/// Delay before a capture, giving the collaborator's layout time to settle.
const SETTLE_DELAY: Duration = Duration::from_millis(100);
/// Pause between items of a batch export.
const BATCH_DELAY: Duration = Duration::from_millis(200);

/// Export failures, surfaced to the user per item.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The requested paper does not exist.
    #[error("paper {0} not found")]
    TargetNotFound(String),

    #[error("export failed: {0}")]
    Failed(String),
}

/// External collaborator that renders a paper to an image data URL.
#[async_trait]
pub trait PaperRenderer: Send + Sync {
    async fn render(&self, paper: &TaskSet, background: &str) -> Result<String, ExportError>;
}

/// Renderer backed by an HTTP rendering service.
pub struct HttpRenderer {
    client: Client,
    base_url: String,
}

impl HttpRenderer {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RenderRequest<'a> {
    paper: &'a TaskSet,
    #[serde(rename = "backgroundColor")]
    background_color: &'a str,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    #[serde(rename = "dataUrl")]
    data_url: String,
}

#[async_trait]
impl PaperRenderer for HttpRenderer {
    async fn render(&self, paper: &TaskSet, background: &str) -> Result<String, ExportError> {
        let url = format!("{}/render", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&RenderRequest {
                paper,
                background_color: background,
            })
            .send()
            .await
            .map_err(|e| ExportError::Failed(format!("render request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExportError::Failed(format!(
                "render service error {status}: {body}"
            )));
        }

        let parsed: RenderResponse = response
            .json()
            .await
            .map_err(|e| ExportError::Failed(format!("unreadable render response: {e}")))?;
        Ok(parsed.data_url)
    }
}

/// Result of exporting one paper within a batch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOutcome {
    pub set_id: String,
    pub title: String,
    /// Written file on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Orchestrates captures against the rendering collaborator and writes
/// the resulting images to the output directory.
pub struct Exporter {
    renderer: Option<Arc<dyn PaperRenderer>>,
    output_dir: PathBuf,
    settle_delay: Duration,
    batch_delay: Duration,
}

impl Exporter {
    pub fn new(renderer: Option<Arc<dyn PaperRenderer>>, output_dir: PathBuf) -> Self {
        Self {
            renderer,
            output_dir,
            settle_delay: SETTLE_DELAY,
            batch_delay: BATCH_DELAY,
        }
    }

    /// Same, with no delays. Test constructor.
    #[cfg(test)]
    pub fn without_delays(renderer: Option<Arc<dyn PaperRenderer>>, output_dir: PathBuf) -> Self {
        Self {
            renderer,
            output_dir,
            settle_delay: Duration::ZERO,
            batch_delay: Duration::ZERO,
        }
    }

    /// Capture one paper to `<sanitized title>.png` in the output
    /// directory. Waits the settle delay first.
    pub async fn capture(&self, paper: &TaskSet) -> Result<PathBuf, ExportError> {
        let renderer = self
            .renderer
            .as_ref()
            .ok_or_else(|| ExportError::Failed("no rendering service configured".to_string()))?;

        tokio::time::sleep(self.settle_delay).await;

        let data_url = renderer.render(paper, "#ffffff").await?;
        let bytes = decode_data_url(&data_url)?;

        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| ExportError::Failed(format!("cannot create output dir: {e}")))?;
        let path = self
            .output_dir
            .join(format!("{}.png", sanitize_filename(&paper.title)));
        std::fs::write(&path, bytes)
            .map_err(|e| ExportError::Failed(format!("cannot write image: {e}")))?;

        tracing::info!(paper = %paper.title, file = %path.display(), "Exported paper");
        Ok(path)
    }

    /// Capture every paper, one at a time, pausing between items. A
    /// failed item is reported in its outcome and the batch moves on.
    pub async fn capture_all(&self, papers: &[TaskSet]) -> Vec<ExportOutcome> {
        let mut outcomes = Vec::with_capacity(papers.len());
        for (i, paper) in papers.iter().enumerate() {
            let outcome = match self.capture(paper).await {
                Ok(path) => ExportOutcome {
                    set_id: paper.id.clone(),
                    title: paper.title.clone(),
                    file: Some(path),
                    error: None,
                },
                Err(e) => {
                    tracing::error!(paper = %paper.title, "Failed to export paper: {}", e);
                    ExportOutcome {
                        set_id: paper.id.clone(),
                        title: paper.title.clone(),
                        file: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);

            if i + 1 < papers.len() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }
        outcomes
    }
}

/// Decode a `data:<mime>;base64,<payload>` URL into raw bytes.
fn decode_data_url(data_url: &str) -> Result<Vec<u8>, ExportError> {
    let payload = data_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .filter(|(header, _)| header.ends_with(";base64"))
        .map(|(_, payload)| payload)
        .ok_or_else(|| ExportError::Failed("renderer returned no image data URL".to_string()))?;

    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| ExportError::Failed(format!("undecodable image payload: {e}")))
}

/// Make a paper title usable as a filename: forbidden characters become
/// underscores, whitespace collapses, and an empty result falls back to
/// `download`.
pub fn sanitize_filename(name: &str) -> String {
    let mut sane = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => sane.push('_'),
            c if c.is_whitespace() => {
                if !sane.ends_with(' ') {
                    sane.push(' ');
                }
            }
            c => sane.push(c),
        }
    }

    let sane = sane.trim_matches(|c| c == ' ' || c == '_');
    if sane.is_empty() {
        "download".to_string()
    } else {
        sane.to_string()
    }
}
