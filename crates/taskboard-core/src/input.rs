//! # Input Module
//!
//! Create and update bodies as clients actually send them, and the coercion
//! that turns them into typed values.
//!
//! Clients are loose about types: due dates arrive as RFC 3339 strings,
//! bare `YYYY-MM-DD` dates, or epoch milliseconds; user ids arrive as numbers
//! or numeric strings. The wire structs ([`NewTask`], [`TaskPatch`]) keep those
//! fields as raw JSON and `validate()` produces the typed [`TaskDraft`] and
//! [`TaskChanges`] the stores accept.

use crate::{Task, TaskError, TaskId, TaskPriority, TaskStatus, UserId};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

// =============================================================================
// TRI-STATE FIELD
// =============================================================================

/// A field of a partial update.
///
/// Missing from the body, explicitly `null`, or set to a value. Use with
/// `#[serde(default)]` so a missing key becomes [`Field::Absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Absent,
    Null,
    Set(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Absent
    }
}

impl<T> Field<T> {
    /// Convert a set value, where the conversion may itself yield "no value".
    pub fn and_then_opt<U, E>(
        self,
        f: impl FnOnce(T) -> Result<Option<U>, E>,
    ) -> Result<Field<U>, E> {
        match self {
            Field::Absent => Ok(Field::Absent),
            Field::Null => Ok(Field::Null),
            Field::Set(value) => Ok(f(value)?.map_or(Field::Null, Field::Set)),
        }
    }
}

impl<T: Clone> Field<T> {
    /// Write this field into an optional slot. Absent leaves it untouched.
    pub fn apply_to(&self, slot: &mut Option<T>) {
        match self {
            Field::Absent => {}
            Field::Null => *slot = None,
            Field::Set(value) => *slot = Some(value.clone()),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(|value| value.map_or(Field::Null, Field::Set))
    }
}

// =============================================================================
// COERCION
// =============================================================================

const NAIVE_DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a date string. Empty text means "no date".
pub fn parse_date_text(text: &str) -> Result<Option<DateTime<Utc>>, TaskError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|midnight| Some(midnight.and_utc()))
            .ok_or_else(|| TaskError::InvalidDate(text.to_string()));
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| TaskError::InvalidDate(text.to_string()))
}

/// Coerce a JSON value into a due date.
///
/// Accepts RFC 3339, `YYYY-MM-DD`, naive `YYYY-MM-DDTHH:MM[:SS]` (read as UTC)
/// and integer epoch milliseconds. `null` and `""` mean "no date".
pub fn coerce_date(value: &Value) -> Result<Option<DateTime<Utc>>, TaskError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => parse_date_text(text),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .map(Some)
            .ok_or_else(|| TaskError::InvalidDate(number.to_string())),
        other => Err(TaskError::InvalidDate(other.to_string())),
    }
}

/// Coerce a JSON value into an owner id.
///
/// Non-negative integers and numeric strings qualify; anything else is
/// treated as "no owner given" rather than an error.
pub fn coerce_user_id(value: &Value) -> Option<UserId> {
    match value {
        Value::Number(number) => number.as_u64().map(UserId),
        Value::String(text) => text.trim().parse::<u64>().ok().map(UserId),
        _ => None,
    }
}

/// Round decimal text half-up to an integer without going through floats.
pub(crate) fn round_decimal_text(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let mut value: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    if fraction.as_bytes().first().is_some_and(|digit| *digit >= b'5') {
        value = value.checked_add(1)?;
    }
    Some(if negative { -value } else { value })
}

/// Whether decimal text lies within 0..=100 before any rounding.
///
/// Expects text already accepted by [`round_decimal_text`].
fn decimal_text_within_grade_range(text: &str) -> bool {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    let whole = whole.trim_start_matches('0');
    let fraction_is_zero = fraction.bytes().all(|b| b == b'0');

    if negative {
        return whole.is_empty() && fraction_is_zero;
    }
    match whole.parse::<u8>() {
        _ if whole.is_empty() => true,
        Ok(value) if value < 100 => true,
        Ok(100) => fraction_is_zero,
        _ => false,
    }
}

/// Coerce a JSON value into a 0..=100 grade.
///
/// Values outside 0..=100 are rejected as given, so `100.4` and `-0.3` are
/// errors. In-range fractional grades round half-up. `null` and `""` mean
/// "no grade".
pub fn coerce_grade(value: &Value) -> Result<Option<u8>, TaskError> {
    let invalid = || TaskError::InvalidGrade(value.to_string());
    let text = match value {
        Value::Null => return Ok(None),
        Value::Number(number) => match number.as_i64() {
            Some(whole @ 0..=100) => return Ok(Some(whole as u8)),
            Some(_) => return Err(invalid()),
            None => number.to_string(),
        },
        Value::String(text) if text.trim().is_empty() => return Ok(None),
        Value::String(text) => text.clone(),
        _ => return Err(invalid()),
    };

    match round_decimal_text(&text) {
        Some(grade @ 0..=100) if decimal_text_within_grade_range(&text) => Ok(Some(grade as u8)),
        _ => Err(invalid()),
    }
}

/// Trim text; blank becomes `None`.
pub fn clean_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn parse_status(text: Option<String>) -> Result<Option<TaskStatus>, TaskError> {
    clean_text(text).map(|s| s.parse()).transpose()
}

fn parse_priority(text: Option<String>) -> Result<Option<TaskPriority>, TaskError> {
    clean_text(text).map(|s| s.parse()).transpose()
}

// =============================================================================
// CREATE
// =============================================================================

/// Body of `POST /api/tasks`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub course: Option<String>,
    pub assigned_by: Option<String>,
    pub due_date: Option<Value>,
    pub user_id: Option<Value>,
    pub submission_url: Option<String>,
    pub grade: Option<Value>,
    pub feedback: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewTask {
    /// Validate and coerce into a [`TaskDraft`].
    pub fn validate(self) -> Result<TaskDraft, TaskError> {
        let title = clean_text(self.title).ok_or(TaskError::MissingTitle)?;
        let due_date = match &self.due_date {
            Some(value) => coerce_date(value)?,
            None => None,
        };
        let grade = match &self.grade {
            Some(value) => coerce_grade(value)?,
            None => None,
        };

        Ok(TaskDraft {
            title,
            description: clean_text(self.description),
            status: parse_status(self.status)?.unwrap_or_default(),
            priority: parse_priority(self.priority)?.unwrap_or_default(),
            course: clean_text(self.course),
            assigned_by: clean_text(self.assigned_by),
            due_date,
            user_id: self.user_id.as_ref().and_then(coerce_user_id),
            submission_url: clean_text(self.submission_url),
            grade,
            feedback: clean_text(self.feedback),
            tags: self.tags,
        })
    }
}

/// A validated task waiting for an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub course: Option<String>,
    pub assigned_by: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub user_id: Option<UserId>,
    pub submission_url: Option<String>,
    pub grade: Option<u8>,
    pub feedback: Option<String>,
    pub tags: Vec<String>,
}

impl TaskDraft {
    /// Start a draft with defaults.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: TaskStatus::default(),
            priority: TaskPriority::default(),
            course: None,
            assigned_by: None,
            due_date: None,
            user_id: None,
            submission_url: None,
            grade: None,
            feedback: None,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_course(mut self, course: impl Into<String>) -> Self {
        self.course = Some(course.into());
        self
    }

    #[must_use]
    pub fn with_assigned_by(mut self, lecturer: impl Into<String>) -> Self {
        self.assigned_by = Some(lecturer.into());
        self
    }

    #[must_use]
    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: UserId) -> Self {
        self.user_id = Some(user);
        self
    }

    /// Materialize the draft as a stored task.
    #[must_use]
    pub fn into_task(self, id: TaskId, now: DateTime<Utc>) -> Task {
        let mut task = Task::new(id, self.title, now);
        task.description = self.description;
        task.set_status(self.status);
        task.priority = self.priority;
        task.course = self.course;
        task.assigned_by = self.assigned_by;
        task.due_date = self.due_date;
        task.user_id = self.user_id;
        task.submission_url = self.submission_url;
        task.grade = self.grade;
        task.feedback = self.feedback;
        task.tags = self.tags;
        task
    }
}

// =============================================================================
// UPDATE
// =============================================================================

/// Body of `PUT /api/tasks/{id}`. Only keys present in the body change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Field<String>,
    #[serde(default)]
    pub description: Field<String>,
    #[serde(default)]
    pub status: Field<String>,
    #[serde(default)]
    pub priority: Field<String>,
    #[serde(default)]
    pub course: Field<String>,
    #[serde(default)]
    pub assigned_by: Field<String>,
    #[serde(default)]
    pub due_date: Field<Value>,
    #[serde(default)]
    pub user_id: Field<Value>,
    #[serde(default)]
    pub submission_url: Field<String>,
    #[serde(default)]
    pub grade: Field<Value>,
    #[serde(default)]
    pub feedback: Field<String>,
    #[serde(default)]
    pub tags: Field<Vec<String>>,
}

impl TaskPatch {
    /// Validate and coerce into [`TaskChanges`].
    pub fn validate(self) -> Result<TaskChanges, TaskError> {
        let title = match self.title {
            Field::Absent => None,
            Field::Null => return Err(TaskError::MissingTitle),
            Field::Set(text) => Some(clean_text(Some(text)).ok_or(TaskError::MissingTitle)?),
        };
        let status = match self.status {
            Field::Set(text) => parse_status(Some(text))?,
            Field::Absent | Field::Null => None,
        };
        let priority = match self.priority {
            Field::Set(text) => parse_priority(Some(text))?,
            Field::Absent | Field::Null => None,
        };
        let user_id = match &self.user_id {
            Field::Set(value) => coerce_user_id(value),
            Field::Absent | Field::Null => None,
        };

        Ok(TaskChanges {
            title,
            description: self.description.and_then_opt(text_field)?,
            status,
            priority,
            course: self.course.and_then_opt(text_field)?,
            assigned_by: self.assigned_by.and_then_opt(text_field)?,
            due_date: self.due_date.and_then_opt(|value| coerce_date(&value))?,
            user_id,
            submission_url: self.submission_url.and_then_opt(text_field)?,
            grade: self.grade.and_then_opt(|value| coerce_grade(&value))?,
            feedback: self.feedback.and_then_opt(text_field)?,
            tags: self.tags,
        })
    }
}

fn text_field(text: String) -> Result<Option<String>, TaskError> {
    Ok(clean_text(Some(text)))
}

/// A validated partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Field<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub course: Field<String>,
    pub assigned_by: Field<String>,
    pub due_date: Field<DateTime<Utc>>,
    pub user_id: Option<UserId>,
    pub submission_url: Field<String>,
    pub grade: Field<u8>,
    pub feedback: Field<String>,
    pub tags: Field<Vec<String>>,
}

impl TaskChanges {
    /// Apply to a task and bump `updated_at`, even when nothing else changed.
    pub fn apply(&self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        self.description.apply_to(&mut task.description);
        if let Some(status) = self.status {
            task.set_status(status);
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        self.course.apply_to(&mut task.course);
        self.assigned_by.apply_to(&mut task.assigned_by);
        self.due_date.apply_to(&mut task.due_date);
        if let Some(user) = self.user_id {
            task.user_id = Some(user);
        }
        self.submission_url.apply_to(&mut task.submission_url);
        self.grade.apply_to(&mut task.grade);
        self.feedback.apply_to(&mut task.feedback);
        match &self.tags {
            Field::Absent => {}
            Field::Null => task.tags.clear(),
            Field::Set(tags) => task.tags.clone_from(tags),
        }
        task.updated_at = now.max(task.created_at);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 10, 12, 0, 0).unwrap()
    }

    fn new_task(body: Value) -> Result<TaskDraft, TaskError> {
        serde_json::from_value::<NewTask>(body).unwrap().validate()
    }

    fn patch(body: Value) -> Result<TaskChanges, TaskError> {
        serde_json::from_value::<TaskPatch>(body).unwrap().validate()
    }

    #[test]
    fn date_coercion_accepts_common_shapes() {
        let midnight = Utc.with_ymd_and_hms(2024, 12, 15, 0, 0, 0).unwrap();

        assert_eq!(coerce_date(&json!("2024-12-15")), Ok(Some(midnight)));
        assert_eq!(coerce_date(&json!("2024-12-15T00:00:00Z")), Ok(Some(midnight)));
        assert_eq!(coerce_date(&json!("2024-12-15T02:00:00+02:00")), Ok(Some(midnight)));
        assert_eq!(coerce_date(&json!("2024-12-15T00:00")), Ok(Some(midnight)));
        assert_eq!(
            coerce_date(&json!(midnight.timestamp_millis())),
            Ok(Some(midnight))
        );
    }

    #[test]
    fn date_coercion_blank_and_null_mean_none() {
        assert_eq!(coerce_date(&Value::Null), Ok(None));
        assert_eq!(coerce_date(&json!("   ")), Ok(None));
    }

    #[test]
    fn date_coercion_rejects_garbage() {
        assert!(matches!(coerce_date(&json!("next tuesday")), Err(TaskError::InvalidDate(_))));
        assert!(matches!(coerce_date(&json!(true)), Err(TaskError::InvalidDate(_))));
        assert!(matches!(coerce_date(&json!("2024-02-30")), Err(TaskError::InvalidDate(_))));
    }

    #[test]
    fn user_id_coercion_ignores_non_numbers() {
        assert_eq!(coerce_user_id(&json!(4)), Some(UserId(4)));
        assert_eq!(coerce_user_id(&json!(" 12 ")), Some(UserId(12)));
        assert_eq!(coerce_user_id(&json!("abc")), None);
        assert_eq!(coerce_user_id(&json!(-3)), None);
        assert_eq!(coerce_user_id(&json!(2.5)), None);
        assert_eq!(coerce_user_id(&Value::Null), None);
    }

    #[test]
    fn grade_coercion_rounds_and_bounds() {
        assert_eq!(coerce_grade(&json!(95)), Ok(Some(95)));
        assert_eq!(coerce_grade(&json!(82.5)), Ok(Some(83)));
        assert_eq!(coerce_grade(&json!(82.4)), Ok(Some(82)));
        assert_eq!(coerce_grade(&json!("91")), Ok(Some(91)));
        assert_eq!(coerce_grade(&json!("")), Ok(None));
        assert!(coerce_grade(&json!(101)).is_err());
        assert!(coerce_grade(&json!(-1)).is_err());
        assert!(coerce_grade(&json!("A+")).is_err());
    }

    #[test]
    fn grade_range_is_checked_before_rounding() {
        assert!(coerce_grade(&json!(100.4)).is_err());
        assert!(coerce_grade(&json!("100.01")).is_err());
        assert!(coerce_grade(&json!(-0.4)).is_err());
        assert!(coerce_grade(&json!("-0.3")).is_err());
        assert!(coerce_grade(&json!("250")).is_err());

        assert_eq!(coerce_grade(&json!("100.0")), Ok(Some(100)));
        assert_eq!(coerce_grade(&json!("-0")), Ok(Some(0)));
        assert_eq!(coerce_grade(&json!(99.5)), Ok(Some(100)));
        assert_eq!(coerce_grade(&json!("0.4")), Ok(Some(0)));
        assert_eq!(coerce_grade(&json!("007")), Ok(Some(7)));
    }

    #[test]
    fn round_decimal_text_handles_edges() {
        assert_eq!(round_decimal_text("99.5"), Some(100));
        assert_eq!(round_decimal_text(".7"), Some(1));
        assert_eq!(round_decimal_text("-0.2"), Some(0));
        assert_eq!(round_decimal_text("1e2"), None);
        assert_eq!(round_decimal_text("."), None);
    }

    #[test]
    fn create_requires_title() {
        assert_eq!(new_task(json!({})), Err(TaskError::MissingTitle));
        assert_eq!(new_task(json!({"title": "   "})), Err(TaskError::MissingTitle));
        assert_eq!(new_task(json!({"title": null})), Err(TaskError::MissingTitle));
    }

    #[test]
    fn create_applies_defaults_and_derives_completed() {
        let draft = new_task(json!({"title": "  Essay  "})).unwrap();
        assert_eq!(draft.title, "Essay");
        assert_eq!(draft.status, TaskStatus::Pending);
        assert_eq!(draft.priority, TaskPriority::Medium);

        let draft = new_task(json!({"title": "Done", "status": "completed", "userId": "3"})).unwrap();
        let task = draft.into_task(TaskId(1), now());
        assert!(task.completed);
        assert_eq!(task.user_id, Some(UserId(3)));
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn create_rejects_unknown_status() {
        assert!(matches!(
            new_task(json!({"title": "x", "status": "archived"})),
            Err(TaskError::InvalidStatus(_))
        ));
    }

    #[test]
    fn patch_distinguishes_absent_null_and_set() {
        let mut task = TaskDraft::new("Lab")
            .with_course("CS101")
            .with_due_date(now())
            .into_task(TaskId(1), now());
        task.feedback = Some("ok".to_string());

        let later = now() + chrono::Duration::hours(1);
        patch(json!({"dueDate": null, "course": "CS201"}))
            .unwrap()
            .apply(&mut task, later);

        assert_eq!(task.due_date, None);
        assert_eq!(task.course.as_deref(), Some("CS201"));
        assert_eq!(task.feedback.as_deref(), Some("ok"));
        assert_eq!(task.updated_at, later);
    }

    #[test]
    fn patch_empty_due_date_string_clears() {
        let changes = patch(json!({"dueDate": ""})).unwrap();
        assert_eq!(changes.due_date, Field::Null);
    }

    #[test]
    fn patch_status_recomputes_completed() {
        let mut task = TaskDraft::new("Lab").into_task(TaskId(1), now());
        patch(json!({"status": "completed"})).unwrap().apply(&mut task, now());
        assert!(task.completed);

        patch(json!({"status": "in-progress"})).unwrap().apply(&mut task, now());
        assert!(!task.completed);
        assert_eq!(task.status, TaskStatus::InProgress);
    }

    #[test]
    fn patch_invalid_user_id_keeps_owner() {
        let mut task = TaskDraft::new("Lab")
            .with_user(UserId(5))
            .into_task(TaskId(1), now());
        patch(json!({"userId": "nobody"})).unwrap().apply(&mut task, now());
        assert_eq!(task.user_id, Some(UserId(5)));
    }

    #[test]
    fn patch_rejects_null_title() {
        assert_eq!(patch(json!({"title": null})), Err(TaskError::MissingTitle));
    }

    #[test]
    fn empty_patch_only_bumps_timestamp() {
        let mut task = TaskDraft::new("Lab").into_task(TaskId(1), now());
        let before = task.clone();
        let later = now() + chrono::Duration::minutes(5);

        patch(json!({})).unwrap().apply(&mut task, later);

        assert_eq!(task.updated_at, later);
        task.updated_at = before.updated_at;
        assert_eq!(task, before);
    }

    proptest! {
        #[test]
        fn whole_number_grades_in_range_are_accepted(grade in 0u8..=100) {
            prop_assert_eq!(coerce_grade(&json!(grade)), Ok(Some(grade)));
            prop_assert_eq!(coerce_grade(&json!(grade.to_string())), Ok(Some(grade)));
        }

        #[test]
        fn epoch_millis_survive_coercion(millis in 0i64..4_102_444_800_000) {
            let parsed = coerce_date(&json!(millis)).unwrap().unwrap();
            prop_assert_eq!(parsed.timestamp_millis(), millis);
        }
    }
}
