//! # Normalize Module
//!
//! Turns task records from any of the application's historical layouts into
//! the canonical [`Task`].
//!
//! Three layouts are in circulation:
//!
//! | Layout | Tell-tale fields |
//! |--------|------------------|
//! | relational export | numeric `id`, `userId`, `completed` |
//! | document store | `_id`, `status: "todo"`, `createdBy`, `assignedTo`, `tags` |
//! | browser cache / demo data | string `id`, `YYYY-MM-DD` dates, `status: "overdue"` |
//!
//! Unknown keys are ignored. A record that cannot be salvaged produces a
//! [`NormalizeError`] naming the offending field.

use crate::input::{clean_text, coerce_date, coerce_grade, coerce_user_id};
use crate::{Task, TaskId, TaskPriority, TaskStatus};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Why a record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("expected an array of tasks or an object with a `tasks` array")]
    NotABatch,

    #[error("record has no title")]
    MissingTitle,

    #[error("field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl NormalizeError {
    fn field(field: &'static str, reason: impl ToString) -> Self {
        NormalizeError::InvalidField {
            field,
            reason: reason.to_string(),
        }
    }
}

fn text(record: &Map<String, Value>, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => clean_text(Some(s.clone())),
        _ => None,
    }
}

/// Numeric id from `id`, or from `_id` when `id` is missing.
///
/// Non-numeric ids (document-store object ids, timestamps-as-strings that
/// overflow) leave the task unassigned.
fn record_id(record: &Map<String, Value>) -> TaskId {
    let raw = record.get("id").or_else(|| record.get("_id"));
    match raw {
        Some(Value::Number(n)) => n.as_u64().map(TaskId),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok().map(TaskId),
        _ => None,
    }
    .unwrap_or(TaskId::UNASSIGNED)
}

fn date_field(
    record: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<DateTime<Utc>>, NormalizeError> {
    match record.get(key) {
        Some(value) => coerce_date(value).map_err(|e| NormalizeError::field(key, e)),
        None => Ok(None),
    }
}

fn status_field(record: &Map<String, Value>) -> Result<TaskStatus, NormalizeError> {
    match record.get("status") {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            s.parse().map_err(|e| NormalizeError::field("status", e))
        }
        Some(Value::Null | Value::String(_)) | None => {
            let done = record.get("completed").and_then(Value::as_bool) == Some(true);
            Ok(if done {
                TaskStatus::Completed
            } else {
                TaskStatus::default()
            })
        }
        Some(other) => Err(NormalizeError::field("status", other)),
    }
}

fn priority_field(record: &Map<String, Value>) -> Result<TaskPriority, NormalizeError> {
    match record.get("priority") {
        Some(Value::String(s)) if !s.trim().is_empty() => {
            s.parse().map_err(|e| NormalizeError::field("priority", e))
        }
        Some(Value::Null | Value::String(_)) | None => Ok(TaskPriority::default()),
        Some(other) => Err(NormalizeError::field("priority", other)),
    }
}

/// Normalize one record.
///
/// The returned task carries the record's numeric id, or
/// [`TaskId::UNASSIGNED`] when it had none; the store decides the final id.
pub fn normalize_task(value: &Value, now: DateTime<Utc>) -> Result<Task, NormalizeError> {
    let record = value.as_object().ok_or(NormalizeError::NotAnObject)?;
    let title = text(record, "title").ok_or(NormalizeError::MissingTitle)?;

    let created_at = date_field(record, "createdAt")?.unwrap_or(now);
    let updated_at = date_field(record, "updatedAt")?
        .unwrap_or(now)
        .max(created_at);

    let mut task = Task::new(record_id(record), title, created_at);
    task.updated_at = updated_at;
    task.description = text(record, "description");
    task.set_status(status_field(record)?);
    task.priority = priority_field(record)?;
    task.course = text(record, "course");
    task.assigned_by = text(record, "assignedBy").or_else(|| text(record, "createdBy"));
    task.due_date = date_field(record, "dueDate")?;
    task.user_id = record
        .get("userId")
        .and_then(coerce_user_id)
        .or_else(|| record.get("assignedTo").and_then(coerce_user_id));
    task.submission_url = text(record, "submissionUrl");
    task.grade = match record.get("grade") {
        Some(value) => coerce_grade(value).map_err(|e| NormalizeError::field("grade", e))?,
        None => None,
    };
    task.feedback = text(record, "feedback");
    task.tags = record
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(task)
}

/// Normalize a dump: either a bare array or `{"tasks": [...]}`.
///
/// Each record gets its own result so one bad record does not sink the rest.
pub fn normalize_batch(
    value: &Value,
    now: DateTime<Utc>,
) -> Result<Vec<Result<Task, NormalizeError>>, NormalizeError> {
    let records = match value {
        Value::Array(records) => records,
        Value::Object(map) => map
            .get("tasks")
            .and_then(Value::as_array)
            .ok_or(NormalizeError::NotABatch)?,
        _ => return Err(NormalizeError::NotABatch),
    };

    Ok(records
        .iter()
        .map(|record| normalize_task(record, now))
        .collect())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserId;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 20, 8, 0, 0).unwrap()
    }

    #[test]
    fn relational_shape() {
        let record = json!({
            "id": 12,
            "title": "Seed: Second task",
            "description": "Another seeded task",
            "status": "in-progress",
            "priority": "high",
            "course": "General",
            "assignedBy": "System",
            "dueDate": "2024-11-23T08:00:00.000Z",
            "userId": 1,
            "completed": false,
            "submissionUrl": null,
            "grade": null,
            "feedback": null,
            "createdAt": "2024-11-20T08:00:00.000Z",
            "updatedAt": "2024-11-20T08:00:00.000Z"
        });

        let task = normalize_task(&record, now()).unwrap();
        assert_eq!(task.id, TaskId(12));
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.user_id, Some(UserId(1)));
        assert_eq!(task.assigned_by.as_deref(), Some("System"));
        assert_eq!(
            task.due_date,
            Some(Utc.with_ymd_and_hms(2024, 11, 23, 8, 0, 0).unwrap())
        );
        assert!(!task.completed);
    }

    #[test]
    fn document_store_shape() {
        let record = json!({
            "_id": "65f1c2a9e4b0a1b2c3d4e5f6",
            "title": "  Read chapter 4  ",
            "status": "todo",
            "createdBy": "Dr. Smith",
            "assignedTo": "7",
            "tags": ["reading", "", 3, "week-4"],
            "createdAt": "2024-11-02T10:00:00Z",
            "updatedAt": "2024-11-01T10:00:00Z"
        });

        let task = normalize_task(&record, now()).unwrap();
        assert!(task.id.is_unassigned());
        assert_eq!(task.title, "Read chapter 4");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.assigned_by.as_deref(), Some("Dr. Smith"));
        assert_eq!(task.user_id, Some(UserId(7)));
        assert_eq!(task.tags, vec!["reading".to_string(), "week-4".to_string()]);
        assert!(task.updated_at >= task.created_at);
    }

    #[test]
    fn browser_cache_shape() {
        let record = json!({
            "id": "4",
            "title": "Unit Testing Exercise",
            "description": "Write comprehensive unit tests for the given codebase",
            "dueDate": "2024-12-10",
            "status": "completed",
            "priority": "medium",
            "course": "CS401",
            "assignedBy": "Prof. Brown",
            "createdAt": "2024-10-15",
            "updatedAt": "2024-11-08",
            "grade": 94.5,
            "feedback": "Excellent work! Very thorough test coverage.",
            "color": "bg-orange-500"
        });

        let task = normalize_task(&record, now()).unwrap();
        assert_eq!(task.id, TaskId(4));
        assert!(task.completed);
        assert_eq!(task.grade, Some(95));
        assert_eq!(
            task.created_at,
            Utc.with_ymd_and_hms(2024, 10, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn completed_flag_fills_missing_status() {
        let task = normalize_task(&json!({"title": "x", "completed": true}), now()).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);

        let task = normalize_task(&json!({"title": "x"}), now()).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.created_at, now());
    }

    #[test]
    fn rejects_unsalvageable_records() {
        assert_eq!(normalize_task(&json!([1, 2]), now()), Err(NormalizeError::NotAnObject));
        assert_eq!(
            normalize_task(&json!({"description": "no title"}), now()),
            Err(NormalizeError::MissingTitle)
        );
        assert!(matches!(
            normalize_task(&json!({"title": "x", "status": "archived"}), now()),
            Err(NormalizeError::InvalidField { field: "status", .. })
        ));
        assert!(matches!(
            normalize_task(&json!({"title": "x", "dueDate": "soon"}), now()),
            Err(NormalizeError::InvalidField { field: "dueDate", .. })
        ));
        assert!(matches!(
            normalize_task(&json!({"title": "x", "grade": 140}), now()),
            Err(NormalizeError::InvalidField { field: "grade", .. })
        ));
    }

    #[test]
    fn batch_accepts_array_or_wrapper() {
        let array = json!([{"title": "a"}, {"nope": true}]);
        let results = normalize_batch(&array, now()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());

        let wrapped = json!({"tasks": [{"title": "b"}]});
        assert_eq!(normalize_batch(&wrapped, now()).unwrap().len(), 1);

        assert_eq!(normalize_batch(&json!("tasks"), now()), Err(NormalizeError::NotABatch));
        assert_eq!(normalize_batch(&json!({"items": []}), now()), Err(NormalizeError::NotABatch));
    }
}
