//! # Seed Module
//!
//! Bootstrap tasks for a fresh install and a fixed demo data set.

use crate::{Task, TaskDraft, TaskId, TaskPriority, TaskStatus, UserId};
use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Owner of the bootstrap tasks.
pub const SEED_USER: UserId = UserId(1);

/// The two tasks a fresh install starts with, due in one week and three days.
pub fn seed_tasks(now: DateTime<Utc>) -> Vec<TaskDraft> {
    vec![
        TaskDraft::new("Seed: Welcome task")
            .with_description("This is a seeded task")
            .with_status(TaskStatus::Pending)
            .with_priority(TaskPriority::Medium)
            .with_course("General")
            .with_assigned_by("System")
            .with_due_date(now + Duration::days(7))
            .with_user(SEED_USER),
        TaskDraft::new("Seed: Second task")
            .with_description("Another seeded task")
            .with_status(TaskStatus::InProgress)
            .with_priority(TaskPriority::High)
            .with_course("General")
            .with_assigned_by("System")
            .with_due_date(now + Duration::days(3))
            .with_user(SEED_USER),
    ]
}

fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or_default()
}

struct Demo {
    id: u64,
    title: &'static str,
    description: &'static str,
    due: (u32, u32),
    status: TaskStatus,
    priority: TaskPriority,
    course: &'static str,
    lecturer: &'static str,
    created: (u32, u32),
    updated: (u32, u32),
}

const DEMO: [Demo; 5] = [
    Demo {
        id: 1,
        title: "Programming Assignment 1",
        description: "Implement a basic calculator using Python",
        due: (12, 15),
        status: TaskStatus::InProgress,
        priority: TaskPriority::High,
        course: "CS101",
        lecturer: "Dr. Smith",
        created: (11, 1),
        updated: (11, 10),
    },
    Demo {
        id: 2,
        title: "Binary Search Tree Implementation",
        description: "Create a BST with insert, delete, and search operations",
        due: (12, 20),
        status: TaskStatus::Pending,
        priority: TaskPriority::Medium,
        course: "CS201",
        lecturer: "Prof. Johnson",
        created: (11, 5),
        updated: (11, 5),
    },
    Demo {
        id: 3,
        title: "Database Design Project",
        description: "Design and implement a library management system database",
        due: (12, 25),
        status: TaskStatus::Pending,
        priority: TaskPriority::High,
        course: "CS301",
        lecturer: "Dr. Williams",
        created: (11, 8),
        updated: (11, 8),
    },
    Demo {
        id: 4,
        title: "Unit Testing Exercise",
        description: "Write comprehensive unit tests for the given codebase",
        due: (12, 10),
        status: TaskStatus::Completed,
        priority: TaskPriority::Medium,
        course: "CS401",
        lecturer: "Prof. Brown",
        created: (10, 15),
        updated: (11, 8),
    },
    Demo {
        id: 5,
        title: "Research Paper Review",
        description: "Review and summarize 3 research papers on machine learning",
        due: (11, 30),
        status: TaskStatus::Overdue,
        priority: TaskPriority::Urgent,
        course: "CS101",
        lecturer: "Dr. Smith",
        created: (10, 20),
        updated: (11, 1),
    },
];

/// Five demo assignments across CS101..CS401, one graded, owned by
/// [`SEED_USER`]. Dates are fixed in late 2024.
pub fn demo_tasks() -> Vec<Task> {
    DEMO.iter()
        .map(|demo| {
            let mut task = Task::new(
                TaskId(demo.id),
                demo.title,
                day(2024, demo.created.0, demo.created.1),
            );
            task.updated_at = day(2024, demo.updated.0, demo.updated.1);
            task.description = Some(demo.description.to_string());
            task.set_status(demo.status);
            task.priority = demo.priority;
            task.course = Some(demo.course.to_string());
            task.assigned_by = Some(demo.lecturer.to_string());
            task.due_date = Some(day(2024, demo.due.0, demo.due.1));
            task.user_id = Some(SEED_USER);
            if demo.status == TaskStatus::Completed {
                task.grade = Some(95);
                task.feedback = Some("Excellent work! Very thorough test coverage.".to_string());
            }
            task
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn seed_tasks_are_due_soon() {
        let now = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
        let drafts = seed_tasks(now);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].due_date, Some(now + Duration::days(7)));
        assert_eq!(drafts[1].status, TaskStatus::InProgress);
        assert!(drafts.iter().all(|d| d.user_id == Some(SEED_USER)));
    }

    #[test]
    fn demo_tasks_are_consistent() {
        let tasks = demo_tasks();
        assert_eq!(tasks.len(), 5);
        for task in &tasks {
            assert_eq!(task.completed, task.status == TaskStatus::Completed);
            assert!(task.updated_at >= task.created_at);
        }
        let graded: Vec<_> = tasks.iter().filter(|t| t.grade.is_some()).collect();
        assert_eq!(graded.len(), 1);
        assert_eq!(graded[0].id, TaskId(4));
    }
}
