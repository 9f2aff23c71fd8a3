//! In-memory task store.

use super::{StoreError, TaskStore, counter_after, resolve_import_id};
use crate::{Task, TaskChanges, TaskDraft, TaskFilter, TaskId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Tasks held in a `BTreeMap`. Lost when dropped.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tasks: BTreeMap<TaskId, Task>,
    next_id: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn take_id(&mut self) -> Result<TaskId, StoreError> {
        let id = TaskId(self.next_id);
        self.next_id = counter_after(id)?;
        Ok(id)
    }
}

impl TaskStore for MemoryStore {
    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        Ok(filter.apply(self.tasks.values().cloned()))
    }

    fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.get(&id).cloned())
    }

    fn insert(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Result<Task, StoreError> {
        let id = self.take_id()?;
        let task = draft.into_task(id, now);
        self.tasks.insert(id, task.clone());
        Ok(task)
    }

    fn import(&mut self, mut task: Task) -> Result<Task, StoreError> {
        task.id = resolve_import_id(task.id, self.tasks.contains_key(&task.id), self.next_id);
        self.next_id = self.next_id.max(counter_after(task.id)?);
        self.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    fn update(
        &mut self,
        id: TaskId,
        changes: &TaskChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.get_mut(&id).map(|task| {
            changes.apply(task, now);
            task.clone()
        }))
    }

    fn delete(&mut self, id: TaskId) -> Result<bool, StoreError> {
        Ok(self.tasks.remove(&id).is_some())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.tasks.len())
    }
}
