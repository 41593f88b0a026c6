//! Fixflow Store
//!
//! This crate provides the storage trait and implementations for tasks, their
//! steps, and task notes. The workflow engine treats the store as an injected
//! collaborator: it loads a task with its full step list, computes the next
//! state in memory, and writes it back through [`TaskStore::save_task`].
//!
//! Implementations:
//! - [`MemoryStore`]: process-local, for tests and embedding
//! - [`SqliteStore`]: SQLite via `sqlx`, with bundled migrations

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use fixflow_workflow::{Task, TaskNote};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A record with the same id already exists.
  #[error("already exists: {0}")]
  AlreadyExists(String),

  /// A stored value could not be mapped back onto the model.
  #[error("corrupt record: {0}")]
  Corrupt(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// Applying migrations failed.
  #[error("migration failed: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Storage trait for tasks, steps and notes.
#[async_trait]
pub trait TaskStore: Send + Sync {
  /// Create a task together with its steps.
  async fn create_task(&self, task: &Task) -> Result<(), StoreError>;

  /// Get a task by ID, with its steps in ascending order.
  async fn get_task(&self, task_id: &str) -> Result<Task, StoreError>;

  /// Write the task's status fields and every step's progress fields in one
  /// atomic write. Either all of it lands or none of it does.
  async fn save_task(&self, task: &Task) -> Result<(), StoreError>;

  /// List all tasks, oldest first.
  async fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;

  /// Append a note to a task.
  async fn add_note(&self, note: &TaskNote) -> Result<(), StoreError>;

  /// List notes for a task, oldest first.
  async fn list_notes(&self, task_id: &str) -> Result<Vec<TaskNote>, StoreError>;
}
