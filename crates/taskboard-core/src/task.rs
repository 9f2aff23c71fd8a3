//! # Task Model
//!
//! The canonical task record shared by the API, the CLI and both stores.
//!
//! Wire form is camelCase JSON. Optional fields are always present and
//! serialize as `null` when unset, so the same derive also works for the
//! postcard encoding used by the redb store.

use crate::TaskError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Store-assigned task identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Placeholder for records that have not been given an id yet.
    /// Stores never assign it.
    pub const UNASSIGNED: TaskId = TaskId(0);

    /// Check if this is the placeholder id.
    #[must_use]
    pub fn is_unassigned(self) -> bool {
        self == Self::UNASSIGNED
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(TaskId)
            .map_err(|_| TaskError::InvalidId(s.to_string()))
    }
}

/// Owner of a task (a student account).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// STATUS & PRIORITY
// =============================================================================

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    #[serde(alias = "todo")]
    Pending,
    #[serde(alias = "in_progress")]
    InProgress,
    #[serde(alias = "done")]
    Completed,
    Overdue,
}

impl TaskStatus {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Overdue => "overdue",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskError;

    /// Lenient parse: case-insensitive, accepts the `todo`/`done` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "todo" | "to-do" => Ok(TaskStatus::Pending),
            "in-progress" | "in_progress" | "inprogress" | "in progress" => {
                Ok(TaskStatus::InProgress)
            }
            "completed" | "complete" | "done" => Ok(TaskStatus::Completed),
            "overdue" => Ok(TaskStatus::Overdue),
            _ => Err(TaskError::InvalidStatus(s.to_string())),
        }
    }
}

/// How urgent a task is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" | "normal" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" | "critical" => Ok(TaskPriority::Urgent),
            _ => Err(TaskError::InvalidPriority(s.to_string())),
        }
    }
}

// =============================================================================
// TASK
// =============================================================================

/// A single assignment.
///
/// `completed` mirrors `status == Completed`; use [`Task::set_status`]
/// rather than writing either field directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Course code, e.g. `CS101`.
    pub course: Option<String>,
    /// Lecturer who set the task.
    pub assigned_by: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub user_id: Option<UserId>,
    pub completed: bool,
    pub submission_url: Option<String>,
    /// Percentage grade, 0..=100.
    pub grade: Option<u8>,
    pub feedback: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a task with defaults for everything but id, title and timestamps.
    #[must_use]
    pub fn new(id: TaskId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            course: None,
            assigned_by: None,
            due_date: None,
            user_id: None,
            completed: false,
            submission_url: None,
            grade: None,
            feedback: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the status and keep `completed` in sync.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.completed = status == TaskStatus::Completed;
    }

    /// Check if the task is done.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Check if the due date has passed without the task being completed.
    #[must_use]
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed() && self.due_date.is_some_and(|due| due < now)
    }

    /// Status as the dashboards display it: past-due work reads as overdue.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> TaskStatus {
        if self.is_past_due(now) {
            TaskStatus::Overdue
        } else {
            self.status
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
