//! Read-only aggregates over step lists.
//!
//! Reporting code should depend on these types only, never on the step graph.

use serde::{Deserialize, Serialize};

use crate::types::{StepStatus, TaskStatus, TaskStep};

/// Progress of a single task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
  pub completed_steps_count: usize,
  pub total_steps_count: usize,
  /// Rounded to the nearest integer; 0 when there are no steps.
  pub completion_percentage: u8,
  pub is_complete: bool,
}

impl ProgressSummary {
  pub fn from_steps(steps: &[TaskStep]) -> Self {
    let completed = steps.iter().filter(|s| s.is_done()).count();
    let total = steps.len();
    let is_complete = steps.iter().any(|s| s.is_terminal && s.is_done())
      && !steps.iter().any(|s| s.status == StepStatus::InProgress);

    Self {
      completed_steps_count: completed,
      total_steps_count: total,
      completion_percentage: percentage(completed, total),
      is_complete,
    }
  }

  /// Fold many task summaries into one rollup.
  pub fn aggregate<'a>(summaries: impl IntoIterator<Item = &'a ProgressSummary>) -> RollupSummary {
    let mut rollup = RollupSummary::default();
    for summary in summaries {
      rollup.task_count += 1;
      if summary.is_complete {
        rollup.completed_task_count += 1;
      }
      rollup.completed_steps_count += summary.completed_steps_count;
      rollup.total_steps_count += summary.total_steps_count;
    }
    rollup.completion_percentage = percentage(rollup.completed_steps_count, rollup.total_steps_count);
    rollup
  }
}

/// Aggregate progress across tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupSummary {
  pub task_count: usize,
  pub completed_task_count: usize,
  pub completed_steps_count: usize,
  pub total_steps_count: usize,
  pub completion_percentage: u8,
}

/// Per-task line of a progress report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
  pub task_id: String,
  pub title: String,
  pub status: TaskStatus,
  pub progress: ProgressSummary,
}

/// Task lines together with their rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
  pub tasks: Vec<TaskSummary>,
  pub rollup: RollupSummary,
}

impl ProgressReport {
  pub fn new(tasks: Vec<TaskSummary>) -> Self {
    let rollup = ProgressSummary::aggregate(tasks.iter().map(|t| &t.progress));
    Self { tasks, rollup }
  }
}

pub fn percentage(completed: usize, total: usize) -> u8 {
  if total == 0 {
    return 0;
  }
  let pct = (completed as f64 / total as f64 * 100.0).round();
  pct.clamp(0.0, 100.0) as u8
}
