//! # Taskboard Core
//!
//! The logic behind the Taskboard assignment tracker.
//!
//! This crate is synchronous and network-free. The binary in `apps/taskboard`
//! wraps it in an HTTP server and a CLI.
//!
//! ## Layout
//!
//! - [`task`]: the canonical [`Task`] record, its status and priority
//! - [`input`]: lenient create/update bodies and date/id coercion
//! - [`query`]: filtering and ordering of task lists
//! - [`normalize`]: reconciling task records from older shapes
//! - [`analytics`]: dashboard counters, course and system statistics
//! - [`storage`]: the [`TaskStore`] trait with memory and redb backends
//! - [`seed`]: bootstrap and demo data
//!
//! Time is always passed in explicitly (`now`) so results are reproducible.

pub mod analytics;
pub mod error;
pub mod input;
pub mod normalize;
pub mod query;
pub mod seed;
pub mod storage;
pub mod task;

pub use error::TaskError;
pub use input::{Field, NewTask, TaskChanges, TaskDraft, TaskPatch};
pub use query::TaskFilter;
pub use storage::{MemoryStore, RedbStore, StoreError, TaskStore};
pub use task::{Task, TaskId, TaskPriority, TaskStatus, UserId};
