use std::collections::HashMap;

use async_trait::async_trait;
use fixflow_workflow::{Task, TaskNote};
use tokio::sync::RwLock;

use crate::{StoreError, TaskStore};

/// In-memory store implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
  tasks: RwLock<HashMap<String, Task>>,
  notes: RwLock<Vec<TaskNote>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl TaskStore for MemoryStore {
  async fn create_task(&self, task: &Task) -> Result<(), StoreError> {
    let mut tasks = self.tasks.write().await;
    if tasks.contains_key(&task.task_id) {
      return Err(StoreError::AlreadyExists(task.task_id.clone()));
    }
    tasks.insert(task.task_id.clone(), task.clone());
    Ok(())
  }

  async fn get_task(&self, task_id: &str) -> Result<Task, StoreError> {
    let mut task = self
      .tasks
      .read()
      .await
      .get(task_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
    task.steps.sort_by_key(|s| s.order);
    Ok(task)
  }

  async fn save_task(&self, task: &Task) -> Result<(), StoreError> {
    let mut tasks = self.tasks.write().await;
    let stored = tasks
      .get_mut(&task.task_id)
      .ok_or_else(|| StoreError::NotFound(task.task_id.clone()))?;
    *stored = task.clone();
    Ok(())
  }

  async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
    let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
    tasks.sort_by(|a, b| {
      a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.task_id.cmp(&b.task_id))
    });
    for task in &mut tasks {
      task.steps.sort_by_key(|s| s.order);
    }
    Ok(tasks)
  }

  async fn add_note(&self, note: &TaskNote) -> Result<(), StoreError> {
    if !self.tasks.read().await.contains_key(&note.task_id) {
      return Err(StoreError::NotFound(note.task_id.clone()));
    }
    self.notes.write().await.push(note.clone());
    Ok(())
  }

  async fn list_notes(&self, task_id: &str) -> Result<Vec<TaskNote>, StoreError> {
    Ok(
      self
        .notes
        .read()
        .await
        .iter()
        .filter(|n| n.task_id == task_id)
        .cloned()
        .collect(),
    )
  }
}
