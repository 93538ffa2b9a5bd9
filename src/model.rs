//! Core domain types: papers (task sets) and their tasks.
//!
//! A paper is a named, themed, timestamped ordered list of tasks. The full
//! ordered list of papers is the sole unit of durable state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Accent colors a paper can be assigned at creation.
///
/// The values are the class names the browser front-end styles paper
/// headers with; the backend treats them as opaque strings from a fixed
/// palette.
pub const PAPER_THEME_COLORS: [&str; 5] = [
    "bg-amber-400",
    "bg-sky-400",
    "bg-rose-400",
    "bg-lime-400",
    "bg-violet-400",
];

/// Three-level urgency classification attached to every task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityLevel {
    High,
    Medium,
    Low,
}

/// A single to-do item.
///
/// Serialized with camelCase keys, the shape the durable store record and
/// the browser front-end both use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Stable opaque identifier, assigned at creation and never reassigned.
    pub id: String,
    /// User-visible description. Non-empty; enforced before any mutation.
    pub text: String,
    pub priority: PriorityLevel,
    /// Calendar date with no time component (`YYYY-MM-DD` on the wire).
    pub due_date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
    /// Millisecond timestamp. Display/tie-break only, never an ordering key.
    pub created_at: i64,
}

impl Task {
    /// Create a task with a fresh id and the current timestamp.
    pub fn new(text: impl Into<String>, priority: PriorityLevel, due_date: NaiveDate) -> Self {
        Self {
            id: new_id(),
            text: text.into(),
            priority,
            due_date,
            completed: false,
            created_at: now_millis(),
        }
    }
}

/// A paper: a named, themed collection of tasks.
///
/// `tasks` ordering is insertion order and doubles as display order. AI
/// batches append to the end; edits and toggles mutate in place; deletion
/// removes without reordering the rest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskSet {
    pub id: String,
    /// Display name, user- or AI-assigned. Non-empty.
    pub title: String,
    pub tasks: Vec<Task>,
    /// Palette entry chosen at creation and fixed thereafter.
    pub theme_color: String,
    /// Millisecond timestamp; papers are always listed newest-first by it.
    pub created_at: i64,
}

impl TaskSet {
    /// Create an empty paper with a fresh id and the current timestamp.
    pub fn new(title: impl Into<String>, theme_color: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            tasks: Vec::new(),
            theme_color: theme_color.into(),
            created_at: now_millis(),
        }
    }

    /// Look up a task by id.
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

/// A task record as produced by the generative model, before validation
/// and conversion into a domain [`Task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiGeneratedTask {
    pub text: String,
    /// English label: `High`, `Medium` or `Low`.
    pub priority: String,
    /// Days from today used to compute the due date. Zero and negative
    /// offsets are accepted; the 0-7 range is a prompt convention only.
    #[serde(rename = "dueDateOffset")]
    pub due_date_offset: i64,
}

/// Language the generative model is asked to write task text in.
///
/// Priority labels and JSON keys stay in English regardless.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiLanguage {
    #[default]
    En,
    Hi,
}

impl AiLanguage {
    /// Short language code, as stored in requests.
    pub fn code(&self) -> &'static str {
        match self {
            AiLanguage::En => "en",
            AiLanguage::Hi => "hi",
        }
    }

    /// Full language name, as spelled out in prompts.
    pub fn name(&self) -> &'static str {
        match self {
            AiLanguage::En => "English",
            AiLanguage::Hi => "Hindi",
        }
    }
}

/// Fresh opaque identifier for a task or paper.
///
/// Ids are stored as plain strings so records written by earlier versions
/// of the app, whatever their id shape, stay valid.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time as millisecond timestamp, the representation papers and
/// tasks persist.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_serializes_uppercase() {
        let json = serde_json::to_string(&PriorityLevel::High).unwrap();
        assert_eq!(json, "\"HIGH\"");
        let back: PriorityLevel = serde_json::from_str("\"MEDIUM\"").unwrap();
        assert_eq!(back, PriorityLevel::Medium);
    }

    #[test]
    fn test_due_date_wire_format() {
        let task = Task::new(
            "Buy milk",
            PriorityLevel::Low,
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        );
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["dueDate"], "2025-06-01");
        assert_eq!(value["completed"], false);
    }

    #[test]
    fn test_ai_task_wire_keys() {
        let raw = r#"{"text":"Water plants","priority":"Low","dueDateOffset":2}"#;
        let task: AiGeneratedTask = serde_json::from_str(raw).unwrap();
        assert_eq!(task.due_date_offset, 2);
        assert_eq!(task.priority, "Low");
    }
}
