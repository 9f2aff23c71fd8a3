//! # Analytics Module
//!
//! Everything the student, lecturer and admin dashboards compute from a task
//! list: status buckets, deadline windows, kanban columns, system totals and
//! per-course rows, user activity, the grading queue and week-by-week
//! performance.
//!
//! Integer arithmetic only. Percentages are whole percent rounded down,
//! averages are integer means rounded down.

use crate::{Task, TaskPriority, TaskStatus, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Days covered by the "due this week" counter.
pub const UPCOMING_WINDOW_DAYS: i64 = 7;

/// Course bucket for tasks without a course.
pub const GENERAL_COURSE: &str = "General";

/// Days in one performance period.
pub const PERFORMANCE_PERIOD_DAYS: i64 = 7;

/// Periods reported when the caller does not choose.
pub const DEFAULT_PERFORMANCE_PERIODS: usize = 6;

/// Longest performance history, in periods.
pub const MAX_PERFORMANCE_PERIODS: usize = 52;

/// `part` as a whole percentage of `whole`. Zero when `whole` is zero.
#[must_use]
pub fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    (part.saturating_mul(100) / whole).min(100) as u8
}

fn mean_grade(sum: u64, count: usize) -> Option<u8> {
    (count > 0).then(|| (sum / count as u64).min(100) as u8)
}

// =============================================================================
// BUCKETS & WINDOWS
// =============================================================================

/// Tasks with the given status.
pub fn by_status(tasks: &[Task], status: TaskStatus) -> Vec<&Task> {
    tasks.iter().filter(|t| t.status == status).collect()
}

/// Tasks with the given priority.
pub fn by_priority(tasks: &[Task], priority: TaskPriority) -> Vec<&Task> {
    tasks.iter().filter(|t| t.priority == priority).collect()
}

/// Unfinished tasks due within `[now, now + days]`.
pub fn upcoming(tasks: &[Task], now: DateTime<Utc>, days: i64) -> Vec<&Task> {
    let horizon = now + Duration::days(days);
    tasks
        .iter()
        .filter(|t| !t.is_completed())
        .filter(|t| t.due_date.is_some_and(|due| due >= now && due <= horizon))
        .collect()
}

/// Unfinished tasks whose due date has passed.
pub fn overdue(tasks: &[Task], now: DateTime<Utc>) -> Vec<&Task> {
    tasks.iter().filter(|t| t.is_past_due(now)).collect()
}

// =============================================================================
// STUDENT DASHBOARD
// =============================================================================

/// The four counters on the student dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub completed: usize,
    pub in_progress: usize,
    pub due_this_week: usize,
    pub overdue: usize,
}

/// Compute the student dashboard counters.
pub fn dashboard_stats(tasks: &[Task], now: DateTime<Utc>) -> DashboardStats {
    DashboardStats {
        completed: by_status(tasks, TaskStatus::Completed).len(),
        in_progress: by_status(tasks, TaskStatus::InProgress).len(),
        due_this_week: upcoming(tasks, now, UPCOMING_WINDOW_DAYS).len(),
        overdue: overdue(tasks, now).len(),
    }
}

// =============================================================================
// KANBAN
// =============================================================================

/// One board column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KanbanColumn {
    pub status: TaskStatus,
    pub title: &'static str,
    pub tasks: Vec<Task>,
}

/// Group tasks into the pending / in-progress / completed columns.
///
/// Tasks stored as `overdue` belong to no column.
pub fn kanban(tasks: &[Task]) -> Vec<KanbanColumn> {
    [
        (TaskStatus::Pending, "Pending"),
        (TaskStatus::InProgress, "In Progress"),
        (TaskStatus::Completed, "Completed"),
    ]
    .into_iter()
    .map(|(status, title)| KanbanColumn {
        status,
        title,
        tasks: by_status(tasks, status).into_iter().cloned().collect(),
    })
    .collect()
}

// =============================================================================
// ADMIN DASHBOARD
// =============================================================================

/// System-wide totals for the admin dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// Unfinished and not overdue.
    pub pending_tasks: usize,
    pub overdue_tasks: usize,
    pub completion_rate_percent: u8,
    /// Distinct task owners.
    pub total_users: usize,
}

/// Compute system totals. A task counts as overdue if it is stored as
/// overdue or is past its due date without being completed.
pub fn system_stats(tasks: &[Task], now: DateTime<Utc>) -> SystemStats {
    let completed = tasks.iter().filter(|t| t.is_completed()).count();
    let overdue = tasks
        .iter()
        .filter(|t| t.effective_status(now) == TaskStatus::Overdue)
        .count();
    let users: BTreeSet<UserId> = tasks.iter().filter_map(|t| t.user_id).collect();

    SystemStats {
        total_tasks: tasks.len(),
        completed_tasks: completed,
        pending_tasks: tasks.len().saturating_sub(completed).saturating_sub(overdue),
        overdue_tasks: overdue,
        completion_rate_percent: percent(completed, tasks.len()),
        total_users: users.len(),
    }
}

/// One row of the course analytics table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAnalytics {
    pub course: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub graded_tasks: usize,
    /// Mean of the recorded grades; `None` when nothing is graded.
    pub average_grade: Option<u8>,
    pub completion_rate_percent: u8,
    /// Share of tasks with a submission link.
    pub submission_rate_percent: u8,
}

#[derive(Default)]
struct CourseTally {
    total: usize,
    completed: usize,
    submitted: usize,
    grade_sum: u64,
    graded: usize,
}

/// Per-course rows, ordered by course code.
pub fn course_analytics(tasks: &[Task]) -> Vec<CourseAnalytics> {
    let mut tallies: BTreeMap<String, CourseTally> = BTreeMap::new();

    for task in tasks {
        let course = task.course.clone().unwrap_or_else(|| GENERAL_COURSE.to_string());
        let tally = tallies.entry(course).or_default();
        tally.total = tally.total.saturating_add(1);
        if task.is_completed() {
            tally.completed = tally.completed.saturating_add(1);
        }
        if task.submission_url.is_some() {
            tally.submitted = tally.submitted.saturating_add(1);
        }
        if let Some(grade) = task.grade {
            tally.grade_sum = tally.grade_sum.saturating_add(u64::from(grade));
            tally.graded = tally.graded.saturating_add(1);
        }
    }

    tallies
        .into_iter()
        .map(|(course, tally)| CourseAnalytics {
            course,
            total_tasks: tally.total,
            completed_tasks: tally.completed,
            graded_tasks: tally.graded,
            average_grade: mean_grade(tally.grade_sum, tally.graded),
            completion_rate_percent: percent(tally.completed, tally.total),
            submission_rate_percent: percent(tally.submitted, tally.total),
        })
        .collect()
}

/// Best courses by average grade. Ungraded courses sort last.
pub fn top_courses(rows: &[CourseAnalytics], limit: usize) -> Vec<CourseAnalytics> {
    let mut ranked = rows.to_vec();
    ranked.sort_by(|a, b| {
        b.average_grade
            .cmp(&a.average_grade)
            .then_with(|| a.course.cmp(&b.course))
    });
    ranked.truncate(limit);
    ranked
}

// =============================================================================
// USERS & GRADING
// =============================================================================

/// Activity row for one task owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivity {
    pub user_id: UserId,
    pub tasks_assigned: usize,
    pub tasks_completed: usize,
    pub average_grade: Option<u8>,
    /// Latest `updatedAt` over the user's tasks.
    pub last_active: DateTime<Utc>,
}

struct UserTally {
    assigned: usize,
    completed: usize,
    grade_sum: u64,
    graded: usize,
    last_active: DateTime<Utc>,
}

/// One row per task owner, most recently active first.
///
/// Tasks without an owner are skipped.
pub fn user_activity(tasks: &[Task]) -> Vec<UserActivity> {
    let mut tallies: BTreeMap<UserId, UserTally> = BTreeMap::new();

    for task in tasks {
        let Some(user) = task.user_id else { continue };
        let tally = tallies.entry(user).or_insert(UserTally {
            assigned: 0,
            completed: 0,
            grade_sum: 0,
            graded: 0,
            last_active: task.updated_at,
        });
        tally.assigned = tally.assigned.saturating_add(1);
        if task.is_completed() {
            tally.completed = tally.completed.saturating_add(1);
        }
        if let Some(grade) = task.grade {
            tally.grade_sum = tally.grade_sum.saturating_add(u64::from(grade));
            tally.graded = tally.graded.saturating_add(1);
        }
        tally.last_active = tally.last_active.max(task.updated_at);
    }

    let mut rows: Vec<UserActivity> = tallies
        .into_iter()
        .map(|(user_id, tally)| UserActivity {
            user_id,
            tasks_assigned: tally.assigned,
            tasks_completed: tally.completed,
            average_grade: mean_grade(tally.grade_sum, tally.graded),
            last_active: tally.last_active,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.last_active
            .cmp(&a.last_active)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    rows
}

/// Submitted but ungraded tasks, longest waiting first.
pub fn pending_grading(tasks: &[Task]) -> Vec<&Task> {
    let mut waiting: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.submission_url.is_some() && t.grade.is_none())
        .collect();
    waiting.sort_by_key(|t| (t.updated_at, t.id));
    waiting
}

// =============================================================================
// PERFORMANCE
// =============================================================================

/// Activity inside one `(start, end]` window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodMetrics {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub tasks_created: usize,
    /// Completed tasks last updated inside the window.
    pub tasks_completed: usize,
    /// Mean grade of the tasks completed inside the window.
    pub average_grade: Option<u8>,
    /// Distinct owners with a task updated inside the window.
    pub active_users: usize,
}

/// Consecutive periods ending now, plus growth of the latest period over
/// the one before it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    /// Oldest first.
    pub periods: Vec<PeriodMetrics>,
    pub created_growth_percent: i64,
    pub completed_growth_percent: i64,
}

fn period_metrics(tasks: &[Task], start: DateTime<Utc>, end: DateTime<Utc>) -> PeriodMetrics {
    let within = |at: DateTime<Utc>| at > start && at <= end;

    let created = tasks.iter().filter(|t| within(t.created_at)).count();
    let completed: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.is_completed() && within(t.updated_at))
        .collect();
    let grades: Vec<u8> = completed.iter().filter_map(|t| t.grade).collect();
    let grade_sum: u64 = grades.iter().map(|&g| u64::from(g)).sum();
    let active: BTreeSet<UserId> = tasks
        .iter()
        .filter(|t| within(t.updated_at))
        .filter_map(|t| t.user_id)
        .collect();

    PeriodMetrics {
        period_start: start,
        period_end: end,
        tasks_created: created,
        tasks_completed: completed.len(),
        average_grade: mean_grade(grade_sum, grades.len()),
        active_users: active.len(),
    }
}

/// Week-by-week activity over the last `weeks` periods (capped at
/// [`MAX_PERFORMANCE_PERIODS`]).
pub fn weekly_performance(tasks: &[Task], now: DateTime<Utc>, weeks: usize) -> PerformanceReport {
    let period = Duration::days(PERFORMANCE_PERIOD_DAYS);
    let weeks = weeks.min(MAX_PERFORMANCE_PERIODS);

    let mut periods = Vec::with_capacity(weeks);
    let mut end = now;
    for _ in 0..weeks {
        let Some(start) = end.checked_sub_signed(period) else { break };
        periods.push(period_metrics(tasks, start, end));
        end = start;
    }
    periods.reverse();

    let growth = |metric: fn(&PeriodMetrics) -> usize| match periods.as_slice() {
        [.., previous, current] => growth_rate_percent(metric(current) as u64, metric(previous) as u64),
        _ => 0,
    };
    let created_growth_percent = growth(|p: &PeriodMetrics| p.tasks_created);
    let completed_growth_percent = growth(|p: &PeriodMetrics| p.tasks_completed);

    PerformanceReport {
        periods,
        created_growth_percent,
        completed_growth_percent,
    }
}

/// Period-over-period growth as a signed whole percentage.
///
/// Zero when there is no previous value to compare against.
#[must_use]
pub fn growth_rate_percent(current: u64, previous: u64) -> i64 {
    if previous == 0 {
        return 0;
    }
    let delta = i128::from(current) - i128::from(previous);
    let rate = delta * 100 / i128::from(previous);
    rate.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

// =============================================================================
// TESTS
// =============================================================================
