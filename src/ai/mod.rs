//! AI-assisted content generation.
//!
//! This module provides a trait-based abstraction over generative text
//! models, with Gemini as the primary implementation, plus the prompt
//! building and response validation that turn raw model output into
//! domain records. Nothing the model produces reaches the paper store
//! without passing the schema checks here.

mod gemini;

pub use gemini::{GeminiModel, DEFAULT_GEMINI_MODEL, PLACEHOLDER_API_KEY};

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;

use crate::model::{AiGeneratedTask, AiLanguage, PriorityLevel, Task};

/// Errors from the generation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    /// The credential is unset, a placeholder, or rejected by the backend.
    #[error("Gemini API key is not configured or not valid")]
    InvalidCredentials,

    /// Transport or API failure, wrapping the underlying cause.
    #[error("AI request failed: {0}")]
    RequestFailed(#[source] anyhow::Error),

    /// The response was not parseable JSON. The raw payload is kept for
    /// diagnostics.
    #[error("AI returned invalid JSON")]
    MalformedResponse { raw: String },

    /// The response parsed but did not match the expected shape.
    #[error("AI returned an unexpected data format")]
    UnexpectedSchema { raw: String },
}

/// A generative text model invoked with a single prompt, one round trip,
/// no streaming.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Run one generation request and return the raw text response.
    async fn generate(&self, prompt: &str, temperature: f64) -> Result<String, AiError>;
}

/// The English priority labels the model is instructed to use.
const AI_PRIORITY_LABELS: [&str; 3] = ["High", "Medium", "Low"];

/// Strip optional surrounding ``` / ```json fence markup from a raw model
/// response. Returns the inner payload, or the trimmed input when no
/// fence is present.
pub fn strip_code_fence(raw: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?\s*```$").expect("fence pattern")
    });

    let trimmed = raw.trim();
    match fence.captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str().trim()).unwrap_or(trimmed),
        None => trimmed,
    }
}

/// Parse a raw model response as JSON.
///
/// A response that fails to parse but carries an API-key-rejection phrase
/// is reported as a credential problem rather than a malformed payload.
fn parse_response(raw: &str) -> Result<serde_json::Value, AiError> {
    match serde_json::from_str(strip_code_fence(raw)) {
        Ok(value) => Ok(value),
        Err(_) => {
            let lower = raw.to_lowercase();
            if lower.contains("api key not valid") || lower.contains("invalid api key") {
                Err(AiError::InvalidCredentials)
            } else {
                Err(AiError::MalformedResponse {
                    raw: raw.to_string(),
                })
            }
        }
    }
}

/// Validate a parsed response as an array of generated-task records.
fn validate_task_batch(value: serde_json::Value, raw: &str) -> Result<Vec<AiGeneratedTask>, AiError> {
    let unexpected = || AiError::UnexpectedSchema {
        raw: raw.to_string(),
    };

    let items = value.as_array().ok_or_else(unexpected)?;
    let mut tasks = Vec::with_capacity(items.len());
    for item in items {
        let text = item
            .get("text")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(unexpected)?;
        let priority = item
            .get("priority")
            .and_then(|v| v.as_str())
            .filter(|p| AI_PRIORITY_LABELS.contains(p))
            .ok_or_else(unexpected)?;
        let offset = item
            .get("dueDateOffset")
            .and_then(|v| v.as_f64())
            .ok_or_else(unexpected)?;

        tasks.push(AiGeneratedTask {
            text: text.to_string(),
            priority: priority.to_string(),
            due_date_offset: offset as i64,
        });
    }
    Ok(tasks)
}

/// Validate a parsed response as an array of theme strings.
fn validate_theme_list(value: serde_json::Value, raw: &str) -> Result<Vec<String>, AiError> {
    let unexpected = || AiError::UnexpectedSchema {
        raw: raw.to_string(),
    };

    let items = value.as_array().ok_or_else(unexpected)?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(|s| s.to_string())
                .ok_or_else(unexpected)
        })
        .collect()
}

/// Convert a validated generated-task record into a domain task.
///
/// Unrecognized priority labels fall back to Medium rather than erroring;
/// the due date is `today` plus the offset, with zero and negative
/// offsets accepted as-is.
pub fn into_domain_task(generated: &AiGeneratedTask, today: NaiveDate) -> Task {
    let priority = match generated.priority.as_str() {
        "High" => PriorityLevel::High,
        "Low" => PriorityLevel::Low,
        "Medium" => PriorityLevel::Medium,
        _ => PriorityLevel::Medium,
    };
    let due_date = today + chrono::Duration::days(generated.due_date_offset);
    Task::new(generated.text.clone(), priority, due_date)
}

/// Builds prompts, invokes the model, and validates its output into
/// domain records.
pub struct PaperComposer {
    model: Arc<dyn GenerativeModel>,
}

impl PaperComposer {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Generate a batch of tasks for a fresh paper around `theme`.
    pub async fn themed_task_batch(
        &self,
        theme: &str,
        min_count: u32,
        max_count: u32,
        language: AiLanguage,
    ) -> Result<Vec<AiGeneratedTask>, AiError> {
        let prompt = format!(
            "Generate {min_count}-{max_count} tasks related to the theme: '{theme}'.\n\
             For each task, provide:\n\
             - 'text' (string description, concise and actionable. This text MUST be in {lang}.)\n\
             - 'priority' (string: 'High', 'Medium', or 'Low'. These priority values MUST be in English.)\n\
             - 'dueDateOffset' (integer: number of days from today, 0-7 days).\n\
             Ensure the response is ONLY a valid JSON array of objects. Do not include any \
             explanatory text before or after the JSON.\n\
             JSON keys must be in English. Only the string value for the 'text' key should be in {lang}.",
            lang = language.name(),
        );

        tracing::debug!(theme, language = language.code(), "Requesting themed task batch");
        let raw = self.model.generate(&prompt, 0.75).await?;
        validate_task_batch(parse_response(&raw)?, &raw)
    }

    /// Generate `count` short, diverse themes for new papers.
    pub async fn theme_suggestions(
        &self,
        count: u32,
        language: AiLanguage,
    ) -> Result<Vec<String>, AiError> {
        let prompt = format!(
            "Generate {count} diverse and concise (2-4 words each) themes for to-do list papers.\n\
             The theme text itself MUST be in {lang}.\n\
             Focus on common activities, projects, or goals.\n\
             Ensure the response is ONLY a valid JSON array of strings. Do not include any \
             explanatory text before or after the JSON.",
            lang = language.name(),
        );

        tracing::debug!(count, language = language.code(), "Requesting theme suggestions");
        let raw = self.model.generate(&prompt, 0.8).await?;
        validate_theme_list(parse_response(&raw)?, &raw)
    }

    /// Suggest additional tasks that fit an existing paper, using its
    /// title as the theme hint.
    pub async fn supplemental_tasks(
        &self,
        theme_hint: &str,
        min_count: u32,
        max_count: u32,
        language: AiLanguage,
    ) -> Result<Vec<AiGeneratedTask>, AiError> {
        let prompt = format!(
            "Given a to-do list paper titled '{theme_hint}' (the title itself might be in any \
             language, use it as context), suggest {min_count}-{max_count} additional, varied \
             tasks that would fit this theme.\n\
             The tasks should be concise and actionable.\n\
             For each task, provide:\n\
             - 'text' (string description. This text MUST be in {lang}.)\n\
             - 'priority' (string: 'High', 'Medium', or 'Low'. These priority values MUST be in English.)\n\
             - 'dueDateOffset' (integer: number of days from today, 0-7 days).\n\
             Ensure the response is ONLY a valid JSON array of objects. Do not include any \
             explanatory text before or after the JSON.\n\
             JSON keys must be in English. Only the string value for the 'text' key should be in {lang}.",
            lang = language.name(),
        );

        tracing::debug!(
            theme_hint,
            language = language.code(),
            "Requesting supplemental tasks"
        );
        let raw = self.model.generate(&prompt, 0.7).await?;
        validate_task_batch(parse_response(&raw)?, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Canned-response model for exercising the parse/validate pipeline.
    struct ScriptedModel {
        responses: Mutex<Vec<Result<String, AiError>>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Result<String, AiError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
            })
        }

        fn single(response: &str) -> Arc<Self> {
            Self::new(vec![Ok(response.to_string())])
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        async fn generate(&self, _prompt: &str, _temperature: f64) -> Result<String, AiError> {
            self.responses
                .lock()
                .unwrap()
                .remove(0)
        }
    }

    fn today() -> NaiveDate {
        chrono::Utc::now().date_naive()
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("  [1, 2]  "), "[1, 2]");
    }

    #[tokio::test]
    async fn test_fenced_batch_parses_to_domain_task() {
        let model =
            ScriptedModel::single("```json\n[{\"text\":\"Buy milk\",\"priority\":\"High\",\"dueDateOffset\":0}]\n```");
        let composer = PaperComposer::new(model);

        let batch = composer
            .themed_task_batch("Groceries", 3, 7, AiLanguage::En)
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);

        let task = into_domain_task(&batch[0], today());
        assert_eq!(task.text, "Buy milk");
        assert_eq!(task.priority, PriorityLevel::High);
        assert_eq!(task.due_date, today());
        assert!(!task.completed);
    }

    #[tokio::test]
    async fn test_batch_missing_text_is_schema_error() {
        let model = ScriptedModel::single(r#"[{"priority":"High","dueDateOffset":1}]"#);
        let composer = PaperComposer::new(model);

        let err = composer
            .themed_task_batch("x", 3, 7, AiLanguage::En)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::UnexpectedSchema { raw } if raw.contains("High")));
    }

    #[tokio::test]
    async fn test_batch_bad_priority_is_schema_error() {
        let model =
            ScriptedModel::single(r#"[{"text":"a","priority":"Urgent","dueDateOffset":1}]"#);
        let composer = PaperComposer::new(model);

        let err = composer
            .themed_task_batch("x", 3, 7, AiLanguage::En)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::UnexpectedSchema { .. }));
    }

    #[tokio::test]
    async fn test_batch_non_numeric_offset_is_schema_error() {
        let model =
            ScriptedModel::single(r#"[{"text":"a","priority":"Low","dueDateOffset":"soon"}]"#);
        let composer = PaperComposer::new(model);

        let err = composer
            .themed_task_batch("x", 3, 7, AiLanguage::En)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::UnexpectedSchema { .. }));
    }

    #[tokio::test]
    async fn test_non_array_payload_is_schema_error() {
        let model = ScriptedModel::single(r#"{"tasks":[]}"#);
        let composer = PaperComposer::new(model);

        let err = composer
            .theme_suggestions(3, AiLanguage::En)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::UnexpectedSchema { .. }));
    }

    #[tokio::test]
    async fn test_unparseable_payload_is_malformed() {
        let model = ScriptedModel::single("Sorry, I cannot help with that.");
        let composer = PaperComposer::new(model);

        let err = composer
            .theme_suggestions(3, AiLanguage::En)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::MalformedResponse { raw } if raw.contains("Sorry")));
    }

    #[tokio::test]
    async fn test_key_rejection_text_maps_to_invalid_credentials() {
        let model = ScriptedModel::single("Error: API key not valid. Please pass a valid key.");
        let composer = PaperComposer::new(model);

        let err = composer
            .theme_suggestions(3, AiLanguage::En)
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_theme_suggestions_accept_string_array() {
        let model = ScriptedModel::single(r#"["Weekend Chores","Garden Care"]"#);
        let composer = PaperComposer::new(model);

        let themes = composer.theme_suggestions(2, AiLanguage::Hi).await.unwrap();
        assert_eq!(themes, vec!["Weekend Chores", "Garden Care"]);
    }

    #[test]
    fn test_unrecognized_priority_falls_back_to_medium() {
        let generated = AiGeneratedTask {
            text: "Stretch".to_string(),
            priority: "Sometime".to_string(),
            due_date_offset: 0,
        };
        assert_eq!(
            into_domain_task(&generated, today()).priority,
            PriorityLevel::Medium
        );
    }

    #[test]
    fn test_negative_offset_yields_past_date() {
        let generated = AiGeneratedTask {
            text: "Overdue".to_string(),
            priority: "Low".to_string(),
            due_date_offset: -2,
        };
        let task = into_domain_task(&generated, NaiveDate::from_ymd_opt(2025, 6, 10).unwrap());
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2025, 6, 8).unwrap());
    }
}
