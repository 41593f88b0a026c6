//! Workflow state resolution.
//!
//! [`StateResolver`] derives the read-only view of a task: which step is
//! current, which are completed (in completion order), and which steps the
//! current one could lead to. Nothing here mutates the task.

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::StepGraph;
use crate::progress::ProgressSummary;
use crate::types::{DecisionAnswer, StepStatus, Task, TaskStatus, TaskStep};

/// A step reachable from the current step, with the answer that selects it.
///
/// `condition` is `None` for the single successor of a linear step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewEntry {
  pub step: TaskStep,
  pub condition: Option<DecisionAnswer>,
}

/// Computed projection of a task. Recomputed on every read, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
  pub task_id: String,
  pub task_status: TaskStatus,
  pub current_step: Option<TaskStep>,
  pub completed_steps: Vec<TaskStep>,
  pub preview: Vec<PreviewEntry>,
  pub progress: ProgressSummary,
}

impl WorkflowState {
  /// Resolve the state of a task, validating its graph first.
  pub fn resolve(task: &Task) -> Result<Self, GraphError> {
    Ok(StateResolver::new(task)?.snapshot())
  }
}

/// Read-only queries over a task and its validated step graph.
#[derive(Debug, Clone)]
pub struct StateResolver<'a> {
  task: &'a Task,
  graph: StepGraph<'a>,
}

impl<'a> StateResolver<'a> {
  pub fn new(task: &'a Task) -> Result<Self, GraphError> {
    let graph = StepGraph::for_task(task)?;
    Ok(Self { task, graph })
  }

  pub fn task(&self) -> &'a Task {
    self.task
  }

  pub fn graph(&self) -> &StepGraph<'a> {
    &self.graph
  }

  /// The step in progress, if any.
  ///
  /// A task nobody has touched yet has no step in progress; its entry step
  /// (lowest order, not behind a decision) is treated as current and gets
  /// promoted by the first action taken on it.
  pub fn current_step(&self) -> Option<&'a TaskStep> {
    if self.task.status == TaskStatus::Done {
      return None;
    }

    if let Some(step) = self
      .graph
      .ordered()
      .find(|s| s.status == StepStatus::InProgress)
    {
      return Some(step);
    }

    if self.graph.steps().iter().any(|s| s.is_done()) {
      return None;
    }

    self
      .graph
      .ordered()
      .find(|s| s.status == StepStatus::New && !self.graph.is_decision_target(&s.step_id))
  }

  /// Completed steps, oldest completion first. Ties fall back to `order`.
  pub fn completed_steps(&self) -> Vec<&'a TaskStep> {
    let mut done: Vec<&TaskStep> = self.graph.ordered().filter(|s| s.is_done()).collect();
    done.sort_by(|a, b| {
      a.completed_at
        .cmp(&b.completed_at)
        .then_with(|| a.order.cmp(&b.order))
    });
    done
  }

  /// Steps the current step can lead to. Never mutates anything.
  pub fn preview_next_steps(&self) -> Vec<PreviewEntry> {
    let Some(current) = self.current_step() else {
      return Vec::new();
    };

    if current.is_decision {
      [DecisionAnswer::Yes, DecisionAnswer::No]
        .into_iter()
        .filter_map(|answer| {
          self
            .graph
            .decision_successor(current, answer)
            .ok()
            .map(|step| PreviewEntry {
              step: step.clone(),
              condition: Some(answer),
            })
        })
        .collect()
    } else {
      self
        .graph
        .successor(current)
        .filter(|_| !current.is_terminal)
        .map(|step| PreviewEntry {
          step: step.clone(),
          condition: None,
        })
        .into_iter()
        .collect()
    }
  }

  pub fn progress(&self) -> ProgressSummary {
    ProgressSummary::from_steps(self.graph.steps())
  }

  pub fn snapshot(&self) -> WorkflowState {
    WorkflowState {
      task_id: self.task.task_id.clone(),
      task_status: self.task.status,
      current_step: self.current_step().cloned(),
      completed_steps: self.completed_steps().into_iter().cloned().collect(),
      preview: self.preview_next_steps(),
      progress: self.progress(),
    }
  }
}
