//! # Query Module
//!
//! Filtering and ordering for task lists.
//!
//! Every listing goes newest first: `created_at` descending, ties broken by
//! id descending so two tasks created in the same instant still come back in
//! a stable order.

use crate::{Task, TaskError, TaskPriority, TaskStatus, UserId};
use std::cmp::Ordering;

/// Criteria for `GET /api/tasks`. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub user_id: Option<UserId>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    /// Course code, compared case-insensitively.
    pub course: Option<String>,
    /// Case-insensitive substring of title, description or course.
    pub search: Option<String>,
}

impl TaskFilter {
    /// Match everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from raw query-string values.
    ///
    /// An unparsable `user_id` is ignored (the list is simply not narrowed
    /// by owner). Unparsable status or priority is an error.
    pub fn from_params(
        user_id: Option<&str>,
        status: Option<&str>,
        priority: Option<&str>,
        course: Option<&str>,
        search: Option<&str>,
    ) -> Result<Self, TaskError> {
        let non_blank = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            user_id: user_id.and_then(|raw| raw.trim().parse::<u64>().ok()).map(UserId),
            status: non_blank(status).map(|s| s.parse()).transpose()?,
            priority: non_blank(priority).map(|p| p.parse()).transpose()?,
            course: non_blank(course),
            search: non_blank(search),
        })
    }

    #[must_use]
    pub fn with_user(mut self, user: UserId) -> Self {
        self.user_id = Some(user);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn with_course(mut self, course: impl Into<String>) -> Self {
        self.course = Some(course.into());
        self
    }

    #[must_use]
    pub fn with_search(mut self, needle: impl Into<String>) -> Self {
        self.search = Some(needle.into());
        self
    }

    /// Check a single task against every set criterion.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        if self.user_id.is_some() && task.user_id != self.user_id {
            return false;
        }
        if self.status.is_some_and(|status| task.status != status) {
            return false;
        }
        if self.priority.is_some_and(|priority| task.priority != priority) {
            return false;
        }
        if let Some(course) = &self.course {
            let same = task
                .course
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(course));
            if !same {
                return false;
            }
        }
        if let Some(needle) = &self.search {
            let needle = needle.to_lowercase();
            let hit = [
                Some(task.title.as_str()),
                task.description.as_deref(),
                task.course.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }

    /// Filter and order a collection of tasks.
    pub fn apply<I>(&self, tasks: I) -> Vec<Task>
    where
        I: IntoIterator<Item = Task>,
    {
        let mut selected: Vec<Task> = tasks.into_iter().filter(|t| self.matches(t)).collect();
        sort_newest_first(&mut selected);
        selected
    }
}

/// Listing order: newest `created_at` first, then highest id.
pub fn newest_first(a: &Task, b: &Task) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Sort in listing order.
pub fn sort_newest_first(tasks: &mut [Task]) {
    tasks.sort_by(newest_first);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TaskDraft, TaskId};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 1, 9, 0, 0).unwrap()
    }

    fn sample() -> Vec<Task> {
        vec![
            TaskDraft::new("Programming Assignment 1")
                .with_description("Implement a basic calculator using Python")
                .with_course("CS101")
                .with_status(TaskStatus::InProgress)
                .with_priority(TaskPriority::High)
                .with_user(UserId(1))
                .into_task(TaskId(1), base()),
            TaskDraft::new("Binary Search Tree Implementation")
                .with_course("CS201")
                .with_user(UserId(2))
                .into_task(TaskId(2), base() + Duration::days(1)),
            TaskDraft::new("Database Design Project")
                .with_description("Library management system database")
                .with_course("cs301")
                .with_priority(TaskPriority::High)
                .with_user(UserId(1))
                .into_task(TaskId(3), base() + Duration::days(2)),
        ]
    }

    fn ids(tasks: &[Task]) -> Vec<u64> {
        tasks.iter().map(|t| t.id.0).collect()
    }

    #[test]
    fn empty_filter_returns_newest_first() {
        let result = TaskFilter::new().apply(sample());
        assert_eq!(ids(&result), vec![3, 2, 1]);
    }

    #[test]
    fn filter_by_user() {
        let result = TaskFilter::new().with_user(UserId(1)).apply(sample());
        assert_eq!(ids(&result), vec![3, 1]);
    }

    #[test]
    fn filter_by_status_and_priority() {
        let result = TaskFilter::new()
            .with_priority(TaskPriority::High)
            .with_status(TaskStatus::Pending)
            .apply(sample());
        assert_eq!(ids(&result), vec![3]);
    }

    #[test]
    fn course_match_ignores_case() {
        let result = TaskFilter::new().with_course("CS301").apply(sample());
        assert_eq!(ids(&result), vec![3]);
    }

    #[test]
    fn search_spans_title_description_and_course() {
        assert_eq!(ids(&TaskFilter::new().with_search("calculator").apply(sample())), vec![1]);
        assert_eq!(ids(&TaskFilter::new().with_search("BINARY").apply(sample())), vec![2]);
        assert_eq!(ids(&TaskFilter::new().with_search("cs3").apply(sample())), vec![3]);
        assert!(TaskFilter::new().with_search("thesis").apply(sample()).is_empty());
    }

    #[test]
    fn from_params_ignores_bad_user_id() {
        let filter = TaskFilter::from_params(Some("abc"), None, None, None, None).unwrap();
        assert_eq!(filter.user_id, None);

        let filter = TaskFilter::from_params(Some("7"), Some(""), None, Some(" "), None).unwrap();
        assert_eq!(filter.user_id, Some(UserId(7)));
        assert_eq!(filter.status, None);
        assert_eq!(filter.course, None);
    }

    #[test]
    fn from_params_rejects_bad_status() {
        let result = TaskFilter::from_params(None, Some("archived"), None, None, None);
        assert!(matches!(result, Err(TaskError::InvalidStatus(_))));
    }

    #[test]
    fn equal_timestamps_order_by_id() {
        let tasks = vec![
            TaskDraft::new("a").into_task(TaskId(4), base()),
            TaskDraft::new("b").into_task(TaskId(9), base()),
        ];
        assert_eq!(ids(&TaskFilter::new().apply(tasks)), vec![9, 4]);
    }

    proptest! {
        #[test]
        fn listing_is_always_newest_first(offsets in proptest::collection::vec(0i64..10_000, 0..40)) {
            let tasks: Vec<Task> = offsets
                .iter()
                .enumerate()
                .map(|(i, minutes)| {
                    TaskDraft::new(format!("t{i}"))
                        .into_task(TaskId(i as u64), base() + Duration::minutes(*minutes))
                })
                .collect();

            let listed = TaskFilter::new().apply(tasks);
            prop_assert_eq!(listed.len(), offsets.len());
            for pair in listed.windows(2) {
                prop_assert!(newest_first(&pair[0], &pair[1]) != Ordering::Greater);
            }
        }
    }
}
