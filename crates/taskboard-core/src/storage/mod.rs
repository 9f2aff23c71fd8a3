//! # Storage Module
//!
//! The [`TaskStore`] trait and its two backends.
//!
//! - [`MemoryStore`]: `BTreeMap`, for tests and throwaway servers
//! - [`RedbStore`]: redb embedded database with ACID write transactions,
//!   crash safety (copy-on-write B-trees) and MVCC readers
//!
//! Ids come from a per-store counter starting at 1 and are never reused,
//! even after deletes. Every stored id is below the counter, so `u64::MAX`
//! is never stored; once the counter reaches it, new tasks are refused with
//! [`StoreError::IdSpaceExhausted`].

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::{Task, TaskChanges, TaskDraft, TaskError, TaskFilter, TaskId};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by a store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    #[error(transparent)]
    Validation(#[from] TaskError),

    #[error("task id space exhausted")]
    IdSpaceExhausted,
}

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        StoreError::Database(e.into())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        StoreError::Database(e.into())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        StoreError::Database(e.into())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        StoreError::Database(e.into())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        StoreError::Database(e.into())
    }
}

/// Persistence for tasks.
///
/// Methods are synchronous; the server serializes writers behind a lock.
pub trait TaskStore {
    /// Tasks matching `filter`, newest first.
    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError>;

    /// Fetch a single task.
    fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    /// Assign the next id and persist a new task created at `now`.
    fn insert(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Result<Task, StoreError>;

    /// Persist an already-built task (imports, demo data).
    ///
    /// The task keeps its id when that id is free; otherwise, or when it is
    /// [`TaskId::UNASSIGNED`], it gets the next id. The counter always ends
    /// past the stored id.
    fn import(&mut self, task: Task) -> Result<Task, StoreError>;

    /// Apply a validated update. `None` if the task does not exist.
    fn update(
        &mut self,
        id: TaskId,
        changes: &TaskChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, StoreError>;

    /// Remove a task. `false` if it did not exist.
    fn delete(&mut self, id: TaskId) -> Result<bool, StoreError>;

    /// Number of stored tasks.
    fn len(&self) -> Result<usize, StoreError>;

    /// Check if the store holds no tasks.
    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Every task, newest first.
    fn all(&self) -> Result<Vec<Task>, StoreError> {
        self.list(&TaskFilter::default())
    }
}

/// Pick the id an imported task ends up with.
///
/// `u64::MAX` cannot sit below the counter, so it is treated like an
/// unassigned id.
fn resolve_import_id(requested: TaskId, taken: bool, next_id: u64) -> TaskId {
    if requested.is_unassigned() || requested.0 == u64::MAX || taken {
        TaskId(next_id)
    } else {
        requested
    }
}

/// Counter value after storing `id`.
fn counter_after(id: TaskId) -> Result<u64, StoreError> {
    id.0.checked_add(1).ok_or(StoreError::IdSpaceExhausted)
}

// =============================================================================
// SHARED BACKEND TESTS
// =============================================================================

#[cfg(test)]
pub(crate) mod conformance {
    //! Behavior every backend must share.

    use super::*;
    use crate::{Field, TaskStatus, UserId};
    use chrono::{Duration, TimeZone};

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 1, 9, 0, 0).unwrap()
    }

    pub fn insert_assigns_sequential_ids(store: &mut dyn TaskStore) {
        let a = store.insert(TaskDraft::new("first"), now()).unwrap();
        let b = store.insert(TaskDraft::new("second"), now()).unwrap();
        assert_eq!(a.id, TaskId(1));
        assert_eq!(b.id, TaskId(2));
        assert_eq!(store.len().unwrap(), 2);
    }

    pub fn ids_are_not_reused_after_delete(store: &mut dyn TaskStore) {
        let a = store.insert(TaskDraft::new("first"), now()).unwrap();
        assert!(store.delete(a.id).unwrap());
        assert!(!store.delete(a.id).unwrap());

        let b = store.insert(TaskDraft::new("second"), now()).unwrap();
        assert_eq!(b.id, TaskId(2));
        assert!(store.get(a.id).unwrap().is_none());
    }

    pub fn list_filters_and_orders(store: &mut dyn TaskStore) {
        for (offset, user) in [(0, 1), (1, 2), (2, 1)] {
            store
                .insert(
                    TaskDraft::new(format!("t{offset}")).with_user(UserId(user)),
                    now() + Duration::hours(offset),
                )
                .unwrap();
        }

        let mine = store.list(&TaskFilter::new().with_user(UserId(1))).unwrap();
        let ids: Vec<u64> = mine.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![3, 1]);

        let all = store.all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, TaskId(3));
    }

    pub fn update_applies_changes(store: &mut dyn TaskStore) {
        let task = store.insert(TaskDraft::new("draft"), now()).unwrap();
        let changes = TaskChanges {
            status: Some(TaskStatus::Completed),
            feedback: Field::Set("nice".to_string()),
            ..TaskChanges::default()
        };
        let later = now() + Duration::minutes(10);

        let updated = store.update(task.id, &changes, later).unwrap().unwrap();
        assert!(updated.completed);
        assert_eq!(updated.updated_at, later);
        assert_eq!(store.get(task.id).unwrap(), Some(updated));

        assert!(store.update(TaskId(99), &changes, later).unwrap().is_none());
    }

    pub fn import_keeps_free_ids_and_advances_counter(store: &mut dyn TaskStore) {
        let kept = store.import(Task::new(TaskId(10), "imported", now())).unwrap();
        assert_eq!(kept.id, TaskId(10));

        let clash = store.import(Task::new(TaskId(10), "again", now())).unwrap();
        assert_eq!(clash.id, TaskId(11));

        let fresh = store.import(Task::new(TaskId::UNASSIGNED, "new", now())).unwrap();
        assert_eq!(fresh.id, TaskId(12));

        let next = store.insert(TaskDraft::new("after"), now()).unwrap();
        assert_eq!(next.id, TaskId(13));
    }

    pub fn max_id_import_is_reassigned(store: &mut dyn TaskStore) {
        let imported = store
            .import(Task::new(TaskId(u64::MAX), "imported", now()))
            .unwrap();
        assert_eq!(imported.id, TaskId(1));

        let inserted = store.insert(TaskDraft::new("inserted"), now()).unwrap();
        let fresh = store
            .import(Task::new(TaskId::UNASSIGNED, "unassigned", now()))
            .unwrap();
        assert_eq!(inserted.id, TaskId(2));
        assert_eq!(fresh.id, TaskId(3));
        assert_eq!(store.len().unwrap(), 3);
        assert_eq!(store.get(TaskId(1)).unwrap().unwrap().title, "imported");
    }

    pub fn exhausted_counter_refuses_new_tasks(store: &mut dyn TaskStore) {
        let last = store
            .import(Task::new(TaskId(u64::MAX - 1), "last", now()))
            .unwrap();
        assert_eq!(last.id, TaskId(u64::MAX - 1));

        assert!(matches!(
            store.insert(TaskDraft::new("overflow"), now()),
            Err(StoreError::IdSpaceExhausted)
        ));
        assert!(matches!(
            store.import(Task::new(TaskId::UNASSIGNED, "overflow", now())),
            Err(StoreError::IdSpaceExhausted)
        ));
        assert!(matches!(
            store.import(Task::new(TaskId(u64::MAX - 1), "clash", now())),
            Err(StoreError::IdSpaceExhausted)
        ));

        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(last.id).unwrap().unwrap().title, "last");

        // Free ids below the counter are still importable
        let low = store.import(Task::new(TaskId(7), "low", now())).unwrap();
        assert_eq!(low.id, TaskId(7));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_id_resolution() {
        assert_eq!(resolve_import_id(TaskId(5), false, 2), TaskId(5));
        assert_eq!(resolve_import_id(TaskId(5), true, 9), TaskId(9));
        assert_eq!(resolve_import_id(TaskId::UNASSIGNED, false, 3), TaskId(3));
        assert_eq!(resolve_import_id(TaskId(u64::MAX), false, 4), TaskId(4));
    }

    #[test]
    fn counter_stops_at_the_end_of_the_id_space() {
        assert_eq!(counter_after(TaskId(41)).unwrap(), 42);
        assert!(matches!(
            counter_after(TaskId(u64::MAX)),
            Err(StoreError::IdSpaceExhausted)
        ));
    }
}
