use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fixflow_workflow::{DecisionAnswer, StepStatus, Task, TaskNote, TaskStatus, TaskStep};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};

use crate::{StoreError, TaskStore};

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) a database file and apply migrations.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::new()
      .filename(path.as_ref())
      .create_if_missing(true)
      .foreign_keys(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;

    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await?;
    Ok(())
  }

  async fn fetch_steps(&self, task_id: &str) -> Result<Vec<TaskStep>, StoreError> {
    let rows: Vec<StepRow> = sqlx::query_as(
      r#"
            SELECT step_id, task_id, action, description, step_order, is_decision, is_terminal,
                   requires_note, next_step_if_yes, next_step_if_no, status, completed_at,
                   completed_by, decision_answer, notes
            FROM task_steps
            WHERE task_id = ?
            ORDER BY step_order ASC
            "#,
    )
    .bind(task_id)
    .fetch_all(&self.pool)
    .await?;

    rows.into_iter().map(TaskStep::try_from).collect()
  }
}

#[derive(Debug, FromRow)]
struct TaskRow {
  task_id: String,
  title: String,
  description: String,
  status: String,
  created_at: DateTime<Utc>,
  completed_at: Option<DateTime<Utc>>,
  defect_id: String,
  product_version: Option<String>,
}

#[derive(Debug, FromRow)]
struct StepRow {
  step_id: String,
  task_id: String,
  action: String,
  description: String,
  step_order: i32,
  is_decision: bool,
  is_terminal: bool,
  requires_note: bool,
  next_step_if_yes: Option<String>,
  next_step_if_no: Option<String>,
  status: String,
  completed_at: Option<DateTime<Utc>>,
  completed_by: Option<String>,
  decision_answer: Option<String>,
  notes: Option<String>,
}

#[derive(Debug, FromRow)]
struct NoteRow {
  note_id: String,
  task_id: String,
  content: String,
  author: String,
  created_at: DateTime<Utc>,
}

fn corrupt(id: &str, err: impl std::fmt::Display) -> StoreError {
  StoreError::Corrupt(format!("{id}: {err}"))
}

impl TaskRow {
  fn into_task(self, steps: Vec<TaskStep>) -> Result<Task, StoreError> {
    let status: TaskStatus = self.status.parse().map_err(|e| corrupt(&self.task_id, e))?;
    Ok(Task {
      task_id: self.task_id,
      title: self.title,
      description: self.description,
      status,
      created_at: self.created_at,
      completed_at: self.completed_at,
      defect_id: self.defect_id,
      product_version: self.product_version,
      steps,
    })
  }
}

impl TryFrom<StepRow> for TaskStep {
  type Error = StoreError;

  fn try_from(row: StepRow) -> Result<Self, Self::Error> {
    let status: StepStatus = row.status.parse().map_err(|e| corrupt(&row.step_id, e))?;
    let decision_answer: Option<DecisionAnswer> = row
      .decision_answer
      .as_deref()
      .map(str::parse::<DecisionAnswer>)
      .transpose()
      .map_err(|e| corrupt(&row.step_id, e))?;

    Ok(TaskStep {
      step_id: row.step_id,
      task_id: row.task_id,
      action: row.action,
      description: row.description,
      order: row.step_order,
      is_decision: row.is_decision,
      is_terminal: row.is_terminal,
      requires_note: row.requires_note,
      next_step_if_yes: row.next_step_if_yes,
      next_step_if_no: row.next_step_if_no,
      status,
      completed_at: row.completed_at,
      completed_by: row.completed_by,
      decision_answer,
      notes: row.notes,
    })
  }
}

impl From<NoteRow> for TaskNote {
  fn from(row: NoteRow) -> Self {
    TaskNote {
      note_id: row.note_id,
      task_id: row.task_id,
      content: row.content,
      author: row.author,
      created_at: row.created_at,
    }
  }
}

/// Map a unique-constraint violation onto `AlreadyExists`.
fn map_insert_error(err: sqlx::Error, id: &str) -> StoreError {
  if let sqlx::Error::Database(db) = &err
    && db.is_unique_violation()
  {
    return StoreError::AlreadyExists(id.to_string());
  }
  StoreError::Database(err)
}

#[async_trait]
impl TaskStore for SqliteStore {
  async fn create_task(&self, task: &Task) -> Result<(), StoreError> {
    let mut tx = self.pool.begin().await?;

    sqlx::query(
      r#"
            INSERT INTO tasks (task_id, title, description, status, created_at, completed_at, defect_id, product_version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(&task.task_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status.as_str())
    .bind(task.created_at)
    .bind(task.completed_at)
    .bind(&task.defect_id)
    .bind(&task.product_version)
    .execute(&mut *tx)
    .await
    .map_err(|e| map_insert_error(e, &task.task_id))?;

    for step in &task.steps {
      sqlx::query(
        r#"
            INSERT INTO task_steps (step_id, task_id, action, description, step_order, is_decision,
                                    is_terminal, requires_note, next_step_if_yes, next_step_if_no,
                                    status, completed_at, completed_by, decision_answer, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
      )
      .bind(&step.step_id)
      .bind(&step.task_id)
      .bind(&step.action)
      .bind(&step.description)
      .bind(step.order)
      .bind(step.is_decision)
      .bind(step.is_terminal)
      .bind(step.requires_note)
      .bind(&step.next_step_if_yes)
      .bind(&step.next_step_if_no)
      .bind(step.status.as_str())
      .bind(step.completed_at)
      .bind(&step.completed_by)
      .bind(step.decision_answer.map(|a| a.as_str()))
      .bind(&step.notes)
      .execute(&mut *tx)
      .await
      .map_err(|e| map_insert_error(e, &step.step_id))?;
    }

    tx.commit().await?;
    Ok(())
  }

  async fn get_task(&self, task_id: &str) -> Result<Task, StoreError> {
    let row: Option<TaskRow> = sqlx::query_as(
      r#"
            SELECT task_id, title, description, status, created_at, completed_at, defect_id, product_version
            FROM tasks
            WHERE task_id = ?
            "#,
    )
    .bind(task_id)
    .fetch_optional(&self.pool)
    .await?;

    let row = row.ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
    let steps = self.fetch_steps(task_id).await?;
    row.into_task(steps)
  }

  async fn save_task(&self, task: &Task) -> Result<(), StoreError> {
    let mut tx = self.pool.begin().await?;

    let updated = sqlx::query(
      r#"
            UPDATE tasks
            SET status = ?, completed_at = ?
            WHERE task_id = ?
            "#,
    )
    .bind(task.status.as_str())
    .bind(task.completed_at)
    .bind(&task.task_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
      return Err(StoreError::NotFound(task.task_id.clone()));
    }

    for step in &task.steps {
      let updated = sqlx::query(
        r#"
            UPDATE task_steps
            SET status = ?, completed_at = ?, completed_by = ?, decision_answer = ?, notes = ?
            WHERE step_id = ? AND task_id = ?
            "#,
      )
      .bind(step.status.as_str())
      .bind(step.completed_at)
      .bind(&step.completed_by)
      .bind(step.decision_answer.map(|a| a.as_str()))
      .bind(&step.notes)
      .bind(&step.step_id)
      .bind(&task.task_id)
      .execute(&mut *tx)
      .await?;

      if updated.rows_affected() == 0 {
        return Err(StoreError::NotFound(step.step_id.clone()));
      }
    }

    tx.commit().await?;
    Ok(())
  }

  async fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
    let rows: Vec<TaskRow> = sqlx::query_as(
      r#"
            SELECT task_id, title, description, status, created_at, completed_at, defect_id, product_version
            FROM tasks
            ORDER BY created_at ASC, task_id ASC
            "#,
    )
    .fetch_all(&self.pool)
    .await?;

    let step_rows: Vec<StepRow> = sqlx::query_as(
      r#"
            SELECT step_id, task_id, action, description, step_order, is_decision, is_terminal,
                   requires_note, next_step_if_yes, next_step_if_no, status, completed_at,
                   completed_by, decision_answer, notes
            FROM task_steps
            ORDER BY task_id ASC, step_order ASC
            "#,
    )
    .fetch_all(&self.pool)
    .await?;

    let mut steps_by_task: HashMap<String, Vec<TaskStep>> = HashMap::new();
    for row in step_rows {
      let step = TaskStep::try_from(row)?;
      steps_by_task
        .entry(step.task_id.clone())
        .or_default()
        .push(step);
    }

    rows
      .into_iter()
      .map(|row| {
        let steps = steps_by_task.remove(&row.task_id).unwrap_or_default();
        row.into_task(steps)
      })
      .collect()
  }

  async fn add_note(&self, note: &TaskNote) -> Result<(), StoreError> {
    let exists: Option<(String,)> = sqlx::query_as("SELECT task_id FROM tasks WHERE task_id = ?")
      .bind(&note.task_id)
      .fetch_optional(&self.pool)
      .await?;
    if exists.is_none() {
      return Err(StoreError::NotFound(note.task_id.clone()));
    }

    sqlx::query(
      r#"
            INSERT INTO task_notes (note_id, task_id, content, author, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
    )
    .bind(&note.note_id)
    .bind(&note.task_id)
    .bind(&note.content)
    .bind(&note.author)
    .bind(note.created_at)
    .execute(&self.pool)
    .await
    .map_err(|e| map_insert_error(e, &note.note_id))?;

    Ok(())
  }

  async fn list_notes(&self, task_id: &str) -> Result<Vec<TaskNote>, StoreError> {
    let rows: Vec<NoteRow> = sqlx::query_as(
      r#"
            SELECT note_id, task_id, content, author, created_at
            FROM task_notes
            WHERE task_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
    )
    .bind(task_id)
    .fetch_all(&self.pool)
    .await?;

    Ok(rows.into_iter().map(TaskNote::from).collect())
  }
}
