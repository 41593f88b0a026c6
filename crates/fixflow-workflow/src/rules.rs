//! Per-step requirement predicates.
//!
//! These decide whether a proposed action is permitted right now. They never
//! mutate anything; the engine runs them before computing a transition.

use crate::error::WorkflowError;
use crate::state::StateResolver;
use crate::types::{DecisionAnswer, TaskStatus, TaskStep};

/// Terminal steps always demand a closing note, whatever their own flag says.
pub fn requires_note_for(step: &TaskStep) -> bool {
  step.requires_note || step.is_terminal
}

/// Whether a note carries any non-whitespace text.
pub fn has_text(note: Option<&str>) -> bool {
  note.is_some_and(|n| !n.trim().is_empty())
}

/// Trim a note for storage; whitespace-only notes become `None`.
pub fn normalize_note(note: Option<&str>) -> Option<String> {
  note
    .map(str::trim)
    .filter(|n| !n.is_empty())
    .map(str::to_string)
}

pub fn validate_complete(step: &TaskStep, note: Option<&str>) -> Result<(), WorkflowError> {
  if requires_note_for(step) && !has_text(note) {
    return Err(WorkflowError::NoteRequired {
      step_id: step.step_id.clone(),
    });
  }
  Ok(())
}

/// Validate a decision and parse its answer.
///
/// Checks run in a fixed order: decision flag, note, then answer.
pub fn validate_decision(
  step: &TaskStep,
  answer: &str,
  note: Option<&str>,
) -> Result<DecisionAnswer, WorkflowError> {
  if !step.is_decision {
    return Err(WorkflowError::NotADecisionStep {
      step_id: step.step_id.clone(),
    });
  }
  if requires_note_for(step) && !has_text(note) {
    return Err(WorkflowError::NoteRequired {
      step_id: step.step_id.clone(),
    });
  }
  answer
    .parse::<DecisionAnswer>()
    .map_err(|_| WorkflowError::InvalidAnswer {
      step_id: step.step_id.clone(),
      answer: answer.to_string(),
    })
}

/// The task must still be open and `step` must be its current step.
pub fn validate_actionable_state(
  resolver: &StateResolver<'_>,
  step: &TaskStep,
) -> Result<(), WorkflowError> {
  let task = resolver.task();
  if task.status == TaskStatus::Done {
    return Err(WorkflowError::TaskAlreadyComplete {
      task_id: task.task_id.clone(),
    });
  }

  let current = resolver.current_step();
  if current.is_none_or(|c| c.step_id != step.step_id) {
    return Err(WorkflowError::StepNotCurrent {
      step_id: step.step_id.clone(),
      current: current.map(|c| c.step_id.clone()),
    });
  }
  Ok(())
}
