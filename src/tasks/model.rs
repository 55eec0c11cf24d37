//! Task data model and validation.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^https?://.+\..+").unwrap());

/// Whether a related link looks like an http(s) URL with a dotted host.
pub fn is_valid_link(link: &str) -> bool {
    LINK_RE.is_match(link)
}

/// Parse a due date given either as RFC 3339 or as a bare `YYYY-MM-DD`
/// (midnight UTC).
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

/// Kanban column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Review")]
    Review,
    #[serde(rename = "Done")]
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::ToDo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Review => "Review",
            TaskStatus::Done => "Done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "To Do" => Ok(TaskStatus::ToDo),
            "In Progress" => Ok(TaskStatus::InProgress),
            "Review" => Ok(TaskStatus::Review),
            "Done" => Ok(TaskStatus::Done),
            other => Err(ValidationError::Invalid(format!("Unknown task status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "Low",
            TaskPriority::Medium => "Medium",
            TaskPriority::High => "High",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = ValidationError;

    /// Case-insensitive so LLM output like `"high"` still maps.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(ValidationError::Invalid(format!("Unknown task priority: {other}"))),
        }
    }
}

/// A task on the user's board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub related_links: Vec<String>,
    /// Gmail message the task was extracted from, if any.
    pub source_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create-task input, from the API or from mail extraction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub related_links: Vec<String>,
    #[serde(default)]
    pub source_message_id: Option<String>,
}

impl NewTask {
    /// Validate and materialize into a task owned by `user_id`.
    pub fn into_task(self, user_id: &str) -> Result<Task, ValidationError> {
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ValidationError::Required("title"))?
            .to_string();
        check_links(&self.related_links)?;
        let due_date = match self.due_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_due_date(raw).ok_or_else(|| {
                ValidationError::Invalid(format!("Invalid due date: {raw}"))
            })?),
        };

        let now = Utc::now();
        Ok(Task {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title,
            description: self.description.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
            due_date,
            tags: self.tags,
            related_links: self.related_links,
            source_message_id: self.source_message_id,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial task update. An empty `due_date` string clears the date.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub related_links: Option<Vec<String>>,
}

impl TaskPatch {
    /// Apply onto `task`, validating every field before mutating anything.
    pub fn apply(self, task: &mut Task) -> Result<(), ValidationError> {
        let title = match self.title.as_deref().map(str::trim) {
            Some("") => return Err(ValidationError::Required("title")),
            other => other.map(str::to_string),
        };
        if let Some(links) = &self.related_links {
            check_links(links)?;
        }
        let due_date = match self.due_date.as_deref().map(str::trim) {
            None => task.due_date,
            Some("") => None,
            Some(raw) => Some(parse_due_date(raw).ok_or_else(|| {
                ValidationError::Invalid(format!("Invalid due date: {raw}"))
            })?),
        };

        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(tags) = self.tags {
            task.tags = tags;
        }
        if let Some(links) = self.related_links {
            task.related_links = links;
        }
        task.due_date = due_date;
        task.updated_at = Utc::now();
        Ok(())
    }
}

fn check_links(links: &[String]) -> Result<(), ValidationError> {
    match links.iter().find(|l| !is_valid_link(l)) {
        Some(bad) => Err(ValidationError::InvalidLink(bad.clone())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(json: &str) -> NewTask {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let task = new_task(r#"{"title":"  Write report  "}"#).into_task("u1").unwrap();
        assert_eq!(task.title, "Write report");
        assert_eq!(task.status, TaskStatus::ToDo);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(task.tags.is_empty());
        assert_eq!(task.description, "");
    }

    #[test]
    fn title_is_required() {
        assert_eq!(
            new_task(r#"{"title":"   "}"#).into_task("u1"),
            Err(ValidationError::Required("title"))
        );
        assert_eq!(new_task("{}").into_task("u1"), Err(ValidationError::Required("title")));
    }

    #[test]
    fn links_are_validated() {
        assert!(is_valid_link("https://example.com/a"));
        assert!(is_valid_link("http://a.b"));
        assert!(!is_valid_link("ftp://example.com"));
        assert!(!is_valid_link("https://localhost"));

        let err = new_task(r#"{"title":"t","related_links":["https://ok.com","nope"]}"#)
            .into_task("u1")
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidLink("nope".into()));
        assert_eq!(err.to_string(), "All the related links must be valid URLs");
    }

    #[test]
    fn status_and_priority_wire_names() {
        let task = new_task(r#"{"title":"t","status":"In Progress","priority":"High"}"#)
            .into_task("u1")
            .unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, TaskPriority::High);
        assert!(serde_json::from_str::<NewTask>(r#"{"title":"t","status":"Blocked"}"#).is_err());
        assert_eq!("high".parse::<TaskPriority>().unwrap(), TaskPriority::High);
    }

    #[test]
    fn due_date_formats() {
        let d = parse_due_date("2025-03-01").unwrap();
        assert_eq!(d.to_rfc3339(), "2025-03-01T00:00:00+00:00");
        assert!(parse_due_date("2025-03-01T10:00:00Z").is_some());
        assert!(parse_due_date("next week").is_none());
    }

    #[test]
    fn patch_is_partial_and_atomic() {
        let mut task = new_task(r#"{"title":"t","due_date":"2025-01-01"}"#)
            .into_task("u1")
            .unwrap();
        let before = task.updated_at;

        let bad = TaskPatch {
            status: Some(TaskStatus::Done),
            related_links: Some(vec!["bad".into()]),
            ..Default::default()
        };
        assert!(bad.apply(&mut task).is_err());
        assert_eq!(task.status, TaskStatus::ToDo);

        TaskPatch {
            status: Some(TaskStatus::Done),
            due_date: Some(String::new()),
            ..Default::default()
        }
        .apply(&mut task)
        .unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.title, "t");
        assert!(task.due_date.is_none());
        assert!(task.updated_at >= before);
    }
}
