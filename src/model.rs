use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const DEFAULT_CATEGORY_COLOR: &str = "#3b82f6";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A task as served by `GET /tasks`.
///
/// `occurs_at` keeps the raw `date` string from the wire so a record with an
/// unparseable timestamp still deserializes and can be reported instead of
/// failing the whole list.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "date", default, deserialize_with = "raw_timestamp")]
    pub occurs_at: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_color: Option<String>,
}

/// Accepts any JSON value for a task's `date`. Strings pass through; null
/// becomes empty and other values keep their JSON text, so the timestamp
/// parser rejects them per task.
fn raw_timestamp<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(raw) => raw,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TaskCreate {
    pub title: String,
    pub description: String,
    pub date: String,
    pub category_id: Option<CategoryId>,
}

/// Partial update for `PUT /tasks/{id}`. Only fields that are `Some` are sent;
/// `category_id: Some(None)` clears the category.
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Option<CategoryId>>,
}

#[derive(Debug, Serialize, Clone)]
pub struct CategoryCreate {
    pub name: String,
    pub color: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("invalid anchor: {0}")]
    InvalidAnchor(String),
    #[error("task {id} has a malformed timestamp: {raw:?}")]
    MalformedTask { id: TaskId, raw: String },
}

impl Task {
    /// Description with the server's empty-string default folded into `None`.
    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

impl TaskUpdate {
    pub fn completed(completed: bool) -> Self {
        TaskUpdate {
            completed: Some(completed),
            ..TaskUpdate::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskUpdate::default()
    }
}

impl CategoryCreate {
    pub fn new(name: impl Into<String>, color: Option<String>) -> Self {
        CategoryCreate {
            name: name.into(),
            color: color.unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
        }
    }
}

/// Local wall-clock timestamp in the shape the API stores (`YYYY-MM-DDTHH:MM:SS`).
pub fn compose_timestamp(date: NaiveDate, time: NaiveTime) -> String {
    date.and_time(time).format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_deserializes_api_shape() {
        let raw = json!({
            "id": 4,
            "title": "Dentist",
            "description": "",
            "date": "2024-03-10T23:30:00",
            "completed": false,
            "category_id": 7,
            "category_name": "Dom",
            "category_color": "#10b981"
        });
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.id, TaskId(4));
        assert_eq!(task.occurs_at, "2024-03-10T23:30:00");
        assert_eq!(task.category_id, Some(CategoryId(7)));
        assert_eq!(task.description(), None);
        assert_eq!(task.category_color.as_deref(), Some("#10b981"));
    }

    #[test]
    fn task_without_category_deserializes() {
        let raw = json!({
            "id": 1,
            "title": "Call mom",
            "date": "2024-03-01T08:00:00",
            "category_id": null,
            "completed": true
        });
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.category_id, None);
        assert!(task.completed);
    }

    #[test]
    fn bad_dates_do_not_fail_the_task_list() {
        let raw = r#"[
            {"id": 1, "title": "ok", "date": "2024-03-10T10:00:00", "completed": false},
            {"id": 2, "title": "null", "date": null, "completed": false},
            {"id": 3, "title": "missing", "completed": false},
            {"id": 4, "title": "number", "date": 20240310, "completed": false}
        ]"#;
        let tasks: Vec<Task> = serde_json::from_str(raw).unwrap();
        let dates: Vec<&str> = tasks.iter().map(|t| t.occurs_at.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-10T10:00:00", "", "", "20240310"]);
    }

    #[test]
    fn update_only_sends_set_fields() {
        let body = serde_json::to_value(TaskUpdate::completed(true)).unwrap();
        assert_eq!(body, json!({ "completed": true }));
    }

    #[test]
    fn update_can_clear_category() {
        let update = TaskUpdate {
            category_id: Some(None),
            ..TaskUpdate::default()
        };
        let body = serde_json::to_value(update).unwrap();
        assert_eq!(body, json!({ "category_id": null }));
    }

    #[test]
    fn create_sends_null_category() {
        let create = TaskCreate {
            title: "Gym".into(),
            description: String::new(),
            date: "2024-03-02T18:00:00".into(),
            category_id: None,
        };
        let body = serde_json::to_value(create).unwrap();
        assert_eq!(body["category_id"], serde_json::Value::Null);
    }

    #[test]
    fn compose_timestamp_matches_wire_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let time = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        assert_eq!(compose_timestamp(date, time), "2024-03-10T23:30:00");
    }

    #[test]
    fn category_create_defaults_color() {
        assert_eq!(CategoryCreate::new("Work", None).color, DEFAULT_CATEGORY_COLOR);
    }
}
