//! Workflow events and notifiers.
//!
//! Every committed action emits one or more events after the store write has
//! succeeded. Rejected or failed actions emit nothing.

use fixflow_workflow::DecisionAnswer;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
  /// A task was created and persisted.
  TaskCreated { task_id: String, actor: String },

  /// A non-decision step was completed. `next_step_id` is `None` when the
  /// step was terminal.
  StepCompleted {
    task_id: String,
    step_id: String,
    actor: String,
    next_step_id: Option<String>,
  },

  /// A decision step was answered.
  DecisionMade {
    task_id: String,
    step_id: String,
    answer: DecisionAnswer,
    actor: String,
    next_step_id: String,
  },

  /// Progress was rolled back to `step_id`.
  SteppedBack {
    task_id: String,
    step_id: String,
    actor: String,
    /// Steps returned to `New`, in the order they had been completed.
    reset_step_ids: Vec<String>,
  },

  /// The task reached a terminal step and is done.
  TaskCompleted { task_id: String, actor: String },

  /// A note was appended to the task.
  NoteAdded {
    task_id: String,
    note_id: String,
    actor: String,
  },
}

/// Receives workflow events.
///
/// The engine calls `notify` for each event once the change is durable.
/// Implementations decide what to do with them.
pub trait WorkflowNotifier: Send + Sync {
  fn notify(&self, event: WorkflowEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl WorkflowNotifier for NoopNotifier {
  fn notify(&self, _event: WorkflowEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never holds up a task's write lock.
  sender: mpsc::UnboundedSender<WorkflowEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
    Self { sender }
  }

  /// Create a notifier together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self::new(sender), receiver)
  }
}

impl WorkflowNotifier for ChannelNotifier {
  fn notify(&self, event: WorkflowEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
