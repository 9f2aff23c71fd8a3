//! redb-backed task store.
//!
//! Two tables:
//! - `tasks`: task id → postcard-encoded [`Task`]
//! - `meta`: `next_id` → next id to hand out
//!
//! Every mutation runs in a single write transaction, so the counter and the
//! record it produced are committed together.

use super::{StoreError, TaskStore, counter_after, resolve_import_id};
use crate::{Task, TaskChanges, TaskDraft, TaskFilter, TaskId};
use chrono::{DateTime, Utc};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use std::path::Path;

const TASKS: TableDefinition<u64, &[u8]> = TableDefinition::new("tasks");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");
const NEXT_ID_KEY: &str = "next_id";

/// Tasks persisted in a redb file.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open the database at `path`, creating the file and tables if needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        {
            txn.open_table(TASKS)?;
            let mut meta = txn.open_table(META)?;
            if meta.get(NEXT_ID_KEY)?.is_none() {
                meta.insert(NEXT_ID_KEY, 1)?;
            }
        }
        txn.commit()?;

        Ok(Self { db })
    }

    fn next_id(txn: &WriteTransaction) -> Result<u64, StoreError> {
        let meta = txn.open_table(META)?;
        let next = meta.get(NEXT_ID_KEY)?.map(|guard| guard.value()).unwrap_or(1);
        Ok(next.max(1))
    }

    fn set_next_id(txn: &WriteTransaction, next: u64) -> Result<(), StoreError> {
        let mut meta = txn.open_table(META)?;
        meta.insert(NEXT_ID_KEY, next)?;
        Ok(())
    }

    fn put(txn: &WriteTransaction, task: &Task) -> Result<(), StoreError> {
        let bytes = postcard::to_allocvec(task)?;
        let mut table = txn.open_table(TASKS)?;
        table.insert(task.id.0, bytes.as_slice())?;
        Ok(())
    }

    fn fetch(txn: &WriteTransaction, id: TaskId) -> Result<Option<Task>, StoreError> {
        let table = txn.open_table(TASKS)?;
        let found = table.get(id.0)?;
        match found {
            Some(guard) => Ok(Some(postcard::from_bytes(guard.value())?)),
            None => Ok(None),
        }
    }
}

impl TaskStore for RedbStore {
    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TASKS)?;

        let mut tasks = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            tasks.push(postcard::from_bytes::<Task>(value.value())?);
        }
        Ok(filter.apply(tasks))
    }

    fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TASKS)?;
        let found = table.get(id.0)?;
        match found {
            Some(guard) => Ok(Some(postcard::from_bytes(guard.value())?)),
            None => Ok(None),
        }
    }

    fn insert(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Result<Task, StoreError> {
        let txn = self.db.begin_write()?;
        let id = TaskId(Self::next_id(&txn)?);
        let next = counter_after(id)?;
        let task = draft.into_task(id, now);
        Self::put(&txn, &task)?;
        Self::set_next_id(&txn, next)?;
        txn.commit()?;
        Ok(task)
    }

    fn import(&mut self, mut task: Task) -> Result<Task, StoreError> {
        let txn = self.db.begin_write()?;
        let next = Self::next_id(&txn)?;
        let taken = !task.id.is_unassigned() && Self::fetch(&txn, task.id)?.is_some();
        task.id = resolve_import_id(task.id, taken, next);
        let advanced = next.max(counter_after(task.id)?);
        Self::put(&txn, &task)?;
        Self::set_next_id(&txn, advanced)?;
        txn.commit()?;
        Ok(task)
    }

    fn update(
        &mut self,
        id: TaskId,
        changes: &TaskChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, StoreError> {
        let txn = self.db.begin_write()?;
        let Some(mut task) = Self::fetch(&txn, id)? else {
            txn.abort()?;
            return Ok(None);
        };
        changes.apply(&mut task, now);
        Self::put(&txn, &task)?;
        txn.commit()?;
        Ok(Some(task))
    }

    fn delete(&mut self, id: TaskId) -> Result<bool, StoreError> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(TASKS)?;
            table.remove(id.0)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    fn len(&self) -> Result<usize, StoreError> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TASKS)?;
        Ok(table.len()? as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================
