use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseValueError;

/// Overall status of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  #[default]
  New,
  InProgress,
  Done,
}

/// Status of a single step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
  #[default]
  New,
  InProgress,
  Done,
}

/// Answer given to a decision step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionAnswer {
  Yes,
  No,
}

macro_rules! status_strings {
  ($ty:ident, $kind:literal) => {
    impl $ty {
      pub fn as_str(&self) -> &'static str {
        match self {
          $ty::New => "new",
          $ty::InProgress => "in_progress",
          $ty::Done => "done",
        }
      }
    }

    impl fmt::Display for $ty {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
      }
    }

    impl FromStr for $ty {
      type Err = ParseValueError;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
          "new" => Ok($ty::New),
          "in_progress" => Ok($ty::InProgress),
          "done" => Ok($ty::Done),
          other => Err(ParseValueError {
            kind: $kind,
            value: other.to_string(),
          }),
        }
      }
    }
  };
}

status_strings!(TaskStatus, "task status");
status_strings!(StepStatus, "step status");

impl DecisionAnswer {
  pub fn as_str(&self) -> &'static str {
    match self {
      DecisionAnswer::Yes => "Yes",
      DecisionAnswer::No => "No",
    }
  }
}

impl fmt::Display for DecisionAnswer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Only the exact strings `Yes` and `No` are accepted.
impl FromStr for DecisionAnswer {
  type Err = ParseValueError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "Yes" => Ok(DecisionAnswer::Yes),
      "No" => Ok(DecisionAnswer::No),
      other => Err(ParseValueError {
        kind: "decision answer",
        value: other.to_string(),
      }),
    }
  }
}

/// One node of a task's step graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStep {
  pub step_id: String,
  pub task_id: String,
  /// Short label shown to the person doing the work.
  pub action: String,
  pub description: String,
  /// Position on the default linear path. Unique within a task.
  pub order: i32,
  pub is_decision: bool,
  pub is_terminal: bool,
  pub requires_note: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub next_step_if_yes: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub next_step_if_no: Option<String>,
  #[serde(default)]
  pub status: StepStatus,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed_by: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub decision_answer: Option<DecisionAnswer>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

impl TaskStep {
  /// Create a plain action step in the `New` state.
  pub fn action(
    step_id: impl Into<String>,
    task_id: impl Into<String>,
    action: impl Into<String>,
    order: i32,
  ) -> Self {
    Self {
      step_id: step_id.into(),
      task_id: task_id.into(),
      action: action.into(),
      description: String::new(),
      order,
      is_decision: false,
      is_terminal: false,
      requires_note: false,
      next_step_if_yes: None,
      next_step_if_no: None,
      status: StepStatus::New,
      completed_at: None,
      completed_by: None,
      decision_answer: None,
      notes: None,
    }
  }

  /// Turn this step into a decision with the given successors.
  pub fn decision(mut self, if_yes: impl Into<String>, if_no: impl Into<String>) -> Self {
    self.is_decision = true;
    self.next_step_if_yes = Some(if_yes.into());
    self.next_step_if_no = Some(if_no.into());
    self
  }

  /// Mark this step as terminal.
  pub fn terminal(mut self) -> Self {
    self.is_terminal = true;
    self
  }

  pub fn with_note_required(mut self) -> Self {
    self.requires_note = true;
    self
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  pub fn edge(&self, answer: DecisionAnswer) -> Option<&str> {
    match answer {
      DecisionAnswer::Yes => self.next_step_if_yes.as_deref(),
      DecisionAnswer::No => self.next_step_if_no.as_deref(),
    }
  }

  pub fn has_decision_edges(&self) -> bool {
    self.next_step_if_yes.is_some() || self.next_step_if_no.is_some()
  }

  pub fn is_done(&self) -> bool {
    self.status == StepStatus::Done
  }

  /// Return the step to `New`, dropping everything recorded when it was completed.
  pub fn reset(&mut self) {
    self.status = StepStatus::New;
    self.completed_at = None;
    self.completed_by = None;
    self.decision_answer = None;
    self.notes = None;
  }
}

/// One unit of guided remediation work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
  pub task_id: String,
  pub title: String,
  pub description: String,
  pub status: TaskStatus,
  pub created_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<DateTime<Utc>>,
  /// The defect this task remediates.
  pub defect_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub product_version: Option<String>,
  pub steps: Vec<TaskStep>,
}

impl Task {
  pub fn step(&self, step_id: &str) -> Option<&TaskStep> {
    self.steps.iter().find(|s| s.step_id == step_id)
  }

  pub fn step_mut(&mut self, step_id: &str) -> Option<&mut TaskStep> {
    self.steps.iter_mut().find(|s| s.step_id == step_id)
  }

  /// Latest completion time recorded on any step.
  pub fn last_completed_at(&self) -> Option<DateTime<Utc>> {
    self.steps.iter().filter_map(|s| s.completed_at).max()
  }
}

/// Free-text annotation attached to a task. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNote {
  pub note_id: String,
  pub task_id: String,
  pub content: String,
  pub author: String,
  pub created_at: DateTime<Utc>,
}
