use thiserror::Error;

use crate::types::DecisionAnswer;

/// Structural defects in a task's step data.
///
/// These are detected when a step list is loaded into a [`StepGraph`](crate::StepGraph)
/// and are fatal for the task: no action is accepted until the data is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  #[error("duplicate step id: {step_id}")]
  DuplicateStepId { step_id: String },

  #[error("steps '{first}' and '{second}' share order {order}")]
  DuplicateOrder {
    order: i32,
    first: String,
    second: String,
  },

  #[error("step '{step_id}' belongs to task '{owner}', not '{task_id}'")]
  ForeignStep {
    step_id: String,
    owner: String,
    task_id: String,
  },

  #[error("step '{step_id}' is both a decision and a terminal step")]
  ConflictingFlags { step_id: String },

  #[error("terminal step '{step_id}' has outgoing edges")]
  TerminalHasEdges { step_id: String },

  #[error("decision step '{step_id}' has no '{answer}' edge")]
  MissingDecisionEdge {
    step_id: String,
    answer: DecisionAnswer,
  },

  #[error("step '{step_id}' is not a decision but has decision edges")]
  UnexpectedDecisionEdge { step_id: String },

  #[error("edge from '{step_id}' references unknown step '{target}'")]
  DanglingEdge { step_id: String, target: String },

  #[error("edge from '{step_id}' points backwards to '{target}'")]
  BackwardEdge { step_id: String, target: String },

  #[error("step '{step_id}' is not terminal and has no successor")]
  MissingSuccessor { step_id: String },

  #[error("step '{step_id}' is not a decision step")]
  NotADecision { step_id: String },

  #[error("more than one step is in progress: {}", step_ids.join(", "))]
  MultipleCurrentSteps { step_ids: Vec<String> },

  #[error("task status does not match its steps: {reason}")]
  InconsistentStatus { reason: String },
}

/// Errors raised while validating or resolving workflow actions.
///
/// Everything except [`WorkflowError::InvalidGraph`] is an expected rejection
/// of user input and leaves the task untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
  #[error("invalid step graph: {0}")]
  InvalidGraph(#[from] GraphError),

  #[error("step not found: {step_id}")]
  StepNotFound { step_id: String },

  #[error("step '{step_id}' is not the current step")]
  StepNotCurrent {
    step_id: String,
    current: Option<String>,
  },

  #[error("task '{task_id}' is already complete")]
  TaskAlreadyComplete { task_id: String },

  #[error("step '{step_id}' is not a decision step")]
  NotADecisionStep { step_id: String },

  #[error("step '{step_id}' is a decision and must be answered, not completed")]
  NotADecisionAction { step_id: String },

  #[error("invalid answer '{answer}' for step '{step_id}' (expected Yes or No)")]
  InvalidAnswer { step_id: String, answer: String },

  #[error("step '{step_id}' requires a note")]
  NoteRequired { step_id: String },

  #[error("step '{step_id}' has not been completed")]
  StepNotCompleted { step_id: String },
}

/// A status or answer string that does not name a known value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseValueError {
  pub kind: &'static str,
  pub value: String,
}
