//! The workflow engine.
//!
//! `WorkflowEngine` is the only component that changes task state. Every
//! action follows the same path:
//!
//! 1. load the task (cached after first use) and validate its step graph
//! 2. take the task's write lock
//! 3. compute the next state with a pure transition
//! 4. persist it with one atomic store write
//! 5. only then swap the committed snapshot and emit events
//!
//! Reads (`get_state`) use the committed snapshot and never wait on the
//! write lock, so they always observe a state that was fully persisted.
//!
//! A writer that wakes up holding the lock of a slot that was evicted
//! meanwhile lets go and retries against the current slot, so there is
//! never more than one writer per task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use fixflow_config::TaskTemplate;
use fixflow_store::{StoreError, TaskStore};
use fixflow_workflow::{
  DecisionAnswer, ProgressReport, ProgressSummary, StepGraph, Task, TaskNote, TaskStatus,
  TaskSummary, WorkflowError, WorkflowState,
};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::action::{Action, ActionOutcome};
use crate::error::EngineError;
use crate::events::{NoopNotifier, WorkflowEvent, WorkflowNotifier};
use crate::template::{NewTask, instantiate};
use crate::transition::{self, Transition};

/// Per-task state held by the engine.
struct TaskSlot {
  /// Serializes actions on this task.
  write: Arc<tokio::sync::Mutex<()>>,
  /// Last state that reached the store.
  committed: RwLock<Arc<Task>>,
}

impl TaskSlot {
  fn new(task: Task) -> Self {
    Self {
      write: Arc::new(tokio::sync::Mutex::new(())),
      committed: RwLock::new(Arc::new(task)),
    }
  }

  fn snapshot(&self) -> Arc<Task> {
    self
      .committed
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  fn commit(&self, task: Task) {
    *self
      .committed
      .write()
      .unwrap_or_else(PoisonError::into_inner) = Arc::new(task);
  }
}

/// The workflow engine.
///
/// Generic over `N: WorkflowNotifier` so callers choose how events are
/// observed. Use `WorkflowEngine::new()` to discard them.
pub struct WorkflowEngine<N: WorkflowNotifier = NoopNotifier> {
  store: Arc<dyn TaskStore>,
  notifier: N,
  slots: Mutex<HashMap<String, Arc<TaskSlot>>>,
}

impl WorkflowEngine<NoopNotifier> {
  pub fn new(store: Arc<dyn TaskStore>) -> Self {
    Self::with_notifier(store, NoopNotifier)
  }
}

impl<N: WorkflowNotifier> WorkflowEngine<N> {
  pub fn with_notifier(store: Arc<dyn TaskStore>, notifier: N) -> Self {
    Self {
      store,
      notifier,
      slots: Mutex::new(HashMap::new()),
    }
  }

  /// Persist a fully formed task and make it available to actions.
  #[instrument(name = "create_task", skip_all, fields(task_id = %task.task_id, actor = %actor))]
  pub async fn create_task(&self, task: Task, actor: &str) -> Result<WorkflowState, EngineError> {
    let state = WorkflowState::resolve(&task).map_err(|e| {
      error!(task_id = %task.task_id, error = %e, "invalid step graph");
      EngineError::from(e)
    })?;

    if let Err(e) = self.store.create_task(&task).await {
      error!(task_id = %task.task_id, error = %e, "failed to persist new task");
      return Err(e.into());
    }

    let task_id = task.task_id.clone();
    self
      .lock_slots()
      .insert(task_id.clone(), Arc::new(TaskSlot::new(task)));
    self.publish(WorkflowEvent::TaskCreated {
      task_id,
      actor: actor.to_string(),
    });
    Ok(state)
  }

  /// Create a task from a template. Step ids are generated.
  pub async fn create_from_template(
    &self,
    template: &TaskTemplate,
    details: NewTask,
    actor: &str,
  ) -> Result<WorkflowState, EngineError> {
    let task_id = Uuid::new_v4().to_string();
    let steps = instantiate(template, &task_id)?;
    let task = Task {
      task_id,
      title: details.title,
      description: details.description,
      status: TaskStatus::New,
      created_at: Utc::now(),
      completed_at: None,
      defect_id: details.defect_id,
      product_version: details.product_version,
      steps,
    };
    self.create_task(task, actor).await
  }

  /// Current state of a task, as last committed.
  pub async fn get_state(&self, task_id: &str) -> Result<WorkflowState, EngineError> {
    let slot = self.slot(task_id).await?;
    let task = slot.snapshot();
    Ok(WorkflowState::resolve(&task)?)
  }

  /// The committed task record itself.
  pub async fn get_task(&self, task_id: &str) -> Result<Task, EngineError> {
    let slot = self.slot(task_id).await?;
    Ok(Task::clone(&slot.snapshot()))
  }

  #[instrument(
    name = "complete_step",
    skip_all,
    fields(task_id = %task_id, step_id = %step_id, actor = %actor)
  )]
  pub async fn complete_step(
    &self,
    task_id: &str,
    step_id: &str,
    note: Option<&str>,
    actor: &str,
  ) -> Result<WorkflowState, EngineError> {
    self
      .transition(task_id, |task| {
        transition::complete_step(task, step_id, note, actor, Utc::now())
      })
      .await
  }

  /// Answer a decision step. `answer` must be exactly `Yes` or `No`.
  #[instrument(
    name = "make_decision",
    skip_all,
    fields(task_id = %task_id, step_id = %step_id, answer = %answer, actor = %actor)
  )]
  pub async fn make_decision(
    &self,
    task_id: &str,
    step_id: &str,
    answer: &str,
    note: Option<&str>,
    actor: &str,
  ) -> Result<WorkflowState, EngineError> {
    self
      .transition(task_id, |task| {
        transition::make_decision(task, step_id, answer, note, actor, Utc::now())
      })
      .await
  }

  #[instrument(
    name = "go_back",
    skip_all,
    fields(task_id = %task_id, step_id = %to_step_id, actor = %actor)
  )]
  pub async fn go_back(
    &self,
    task_id: &str,
    to_step_id: &str,
    actor: &str,
  ) -> Result<WorkflowState, EngineError> {
    self
      .transition(task_id, |task| transition::go_back(task, to_step_id, actor))
      .await
  }

  /// Append a free-text note to a task. Any task status is accepted.
  #[instrument(name = "add_note", skip_all, fields(task_id = %task_id, actor = %actor))]
  pub async fn add_note(
    &self,
    task_id: &str,
    content: &str,
    actor: &str,
  ) -> Result<TaskNote, EngineError> {
    let (_slot, _write) = self.lock_slot(task_id).await?;

    let note = TaskNote {
      note_id: Uuid::new_v4().to_string(),
      task_id: task_id.to_string(),
      content: content.to_string(),
      author: actor.to_string(),
      created_at: Utc::now(),
    };
    if let Err(e) = self.store.add_note(&note).await {
      error!(task_id = %task_id, error = %e, "failed to persist note");
      return Err(e.into());
    }

    self.publish(WorkflowEvent::NoteAdded {
      task_id: task_id.to_string(),
      note_id: note.note_id.clone(),
      actor: actor.to_string(),
    });
    Ok(note)
  }

  pub async fn list_notes(&self, task_id: &str) -> Result<Vec<TaskNote>, EngineError> {
    self.slot(task_id).await?;
    Ok(self.store.list_notes(task_id).await?)
  }

  /// Dispatch a client action to the matching operation.
  pub async fn apply(
    &self,
    task_id: &str,
    action: Action,
    actor: &str,
  ) -> Result<ActionOutcome, EngineError> {
    debug!(task_id = %task_id, action = action.name(), "applying action");
    let state = match &action {
      Action::Complete { step_id, note } => {
        self
          .complete_step(task_id, step_id, note.as_deref(), actor)
          .await?
      }
      Action::DecideYes { step_id, note } => {
        let answer = DecisionAnswer::Yes.as_str();
        self
          .make_decision(task_id, step_id, answer, note.as_deref(), actor)
          .await?
      }
      Action::DecideNo { step_id, note } => {
        let answer = DecisionAnswer::No.as_str();
        self
          .make_decision(task_id, step_id, answer, note.as_deref(), actor)
          .await?
      }
      Action::GoBack { step_id } => self.go_back(task_id, step_id, actor).await?,
      Action::AddNote { content } => {
        return Ok(ActionOutcome::Note(
          self.add_note(task_id, content, actor).await?,
        ));
      }
    };
    Ok(ActionOutcome::State(state))
  }

  /// Progress of every stored task, oldest first.
  pub async fn summaries(&self) -> Result<Vec<TaskSummary>, EngineError> {
    let tasks = self.store.list_tasks().await?;
    Ok(
      tasks
        .into_iter()
        .map(|task| TaskSummary {
          progress: ProgressSummary::from_steps(&task.steps),
          task_id: task.task_id,
          title: task.title,
          status: task.status,
        })
        .collect(),
    )
  }

  /// Per-task progress plus the rollup across all stored tasks.
  pub async fn report(&self) -> Result<ProgressReport, EngineError> {
    Ok(ProgressReport::new(self.summaries().await?))
  }

  /// Drop the cached copy of a task. The next access reloads it from the
  /// store. Returns whether anything was cached.
  ///
  /// Waits for an in-flight action on the task to finish first.
  pub async fn evict(&self, task_id: &str) -> bool {
    let Some(slot) = self.cached(task_id) else {
      return false;
    };
    let _write = slot.write.lock().await;

    let mut slots = self.lock_slots();
    let is_current = slots
      .get(task_id)
      .is_some_and(|current| Arc::ptr_eq(current, &slot));
    if is_current {
      slots.remove(task_id);
      debug!(task_id = %task_id, "evicted task");
    }
    is_current
  }

  /// Run one transition under the task's write lock and commit it.
  async fn transition<F>(&self, task_id: &str, f: F) -> Result<WorkflowState, EngineError>
  where
    F: FnOnce(&Task) -> Result<Transition, WorkflowError> + Send,
  {
    let (slot, _write) = self.lock_slot(task_id).await?;
    let current = slot.snapshot();

    let Transition { task, events } = f(&current).map_err(|e| self.rejected(task_id, e))?;
    let state = WorkflowState::resolve(&task).map_err(|e| {
      error!(task_id = %task_id, error = %e, "transition produced an invalid graph");
      EngineError::from(e)
    })?;

    if let Err(e) = self.store.save_task(&task).await {
      error!(task_id = %task_id, error = %e, "failed to persist task");
      return Err(e.into());
    }

    slot.commit(task);
    for event in events {
      self.publish(event);
    }
    Ok(state)
  }

  /// Cached slot for a task, loading and validating it on first use.
  async fn slot(&self, task_id: &str) -> Result<Arc<TaskSlot>, EngineError> {
    if let Some(slot) = self.cached(task_id) {
      return Ok(slot);
    }

    let task = match self.store.get_task(task_id).await {
      Ok(task) => task,
      Err(StoreError::NotFound(_)) => {
        return Err(EngineError::TaskNotFound {
          task_id: task_id.to_string(),
        });
      }
      Err(e) => {
        error!(task_id = %task_id, error = %e, "failed to load task");
        return Err(e.into());
      }
    };

    if let Err(e) = StepGraph::for_task(&task) {
      error!(task_id = %task_id, error = %e, "invalid step graph");
      return Err(e.into());
    }

    // Another caller may have loaded it meanwhile; theirs wins.
    let mut slots = self.lock_slots();
    let slot = slots
      .entry(task_id.to_string())
      .or_insert_with(|| Arc::new(TaskSlot::new(task)));
    Ok(slot.clone())
  }

  /// Cached slot for a task together with its write lock.
  async fn lock_slot(
    &self,
    task_id: &str,
  ) -> Result<(Arc<TaskSlot>, OwnedMutexGuard<()>), EngineError> {
    loop {
      let slot = self.slot(task_id).await?;
      let write = slot.write.clone().lock_owned().await;
      if self
        .cached(task_id)
        .is_some_and(|current| Arc::ptr_eq(&current, &slot))
      {
        return Ok((slot, write));
      }
      debug!(task_id = %task_id, "slot evicted while waiting, retrying");
    }
  }

  fn cached(&self, task_id: &str) -> Option<Arc<TaskSlot>> {
    self.lock_slots().get(task_id).cloned()
  }

  fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<TaskSlot>>> {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn rejected(&self, task_id: &str, err: WorkflowError) -> EngineError {
    if matches!(err, WorkflowError::InvalidGraph(_)) {
      error!(task_id = %task_id, error = %err, "invalid step graph");
    } else {
      debug!(task_id = %task_id, error = %err, "action rejected");
    }
    err.into()
  }

  fn publish(&self, event: WorkflowEvent) {
    match &event {
      WorkflowEvent::TaskCreated { task_id, actor } => {
        info!(task_id = %task_id, actor = %actor, "task_created");
      }
      WorkflowEvent::StepCompleted {
        task_id,
        step_id,
        actor,
        next_step_id,
      } => {
        info!(
          task_id = %task_id,
          step_id = %step_id,
          actor = %actor,
          next_step_id = ?next_step_id,
          "step_completed"
        );
      }
      WorkflowEvent::DecisionMade {
        task_id,
        step_id,
        answer,
        actor,
        next_step_id,
      } => {
        info!(
          task_id = %task_id,
          step_id = %step_id,
          answer = %answer,
          actor = %actor,
          next_step_id = %next_step_id,
          "decision_made"
        );
      }
      WorkflowEvent::SteppedBack {
        task_id,
        step_id,
        actor,
        reset_step_ids,
      } => {
        info!(
          task_id = %task_id,
          step_id = %step_id,
          actor = %actor,
          reset_steps = reset_step_ids.len(),
          "stepped_back"
        );
      }
      WorkflowEvent::TaskCompleted { task_id, actor } => {
        info!(task_id = %task_id, actor = %actor, "task_completed");
      }
      WorkflowEvent::NoteAdded {
        task_id,
        note_id,
        actor,
      } => {
        info!(task_id = %task_id, note_id = %note_id, actor = %actor, "note_added");
      }
    }
    self.notifier.notify(event);
  }
}
