//! Pure state transitions.
//!
//! Each function validates an action against a task and returns the task as
//! it would look afterwards, together with the events the change produces.
//! The input task is never modified; the engine decides whether to commit.

use chrono::{DateTime, Utc};
use fixflow_workflow::{
  GraphError, StateResolver, StepStatus, Task, TaskStatus, TaskStep, WorkflowError, rules,
};

use crate::events::WorkflowEvent;

/// A computed but not yet committed change.
#[derive(Debug, Clone)]
pub struct Transition {
  pub task: Task,
  pub events: Vec<WorkflowEvent>,
}

/// Timestamp for a completion on `task`.
///
/// Never earlier than the latest completion already recorded, so completion
/// order stays consistent when the wall clock steps backwards.
pub fn completion_time(task: &Task, now: DateTime<Utc>) -> DateTime<Utc> {
  match task.last_completed_at() {
    Some(last) if last > now => last,
    _ => now,
  }
}

fn lookup<'a>(resolver: &StateResolver<'a>, step_id: &str) -> Result<&'a TaskStep, WorkflowError> {
  resolver
    .graph()
    .get(step_id)
    .ok_or_else(|| WorkflowError::StepNotFound {
      step_id: step_id.to_string(),
    })
}

fn step_mut<'t>(task: &'t mut Task, step_id: &str) -> Result<&'t mut TaskStep, WorkflowError> {
  task
    .step_mut(step_id)
    .ok_or_else(|| WorkflowError::StepNotFound {
      step_id: step_id.to_string(),
    })
}

/// Mark `step_id` done and record who did it.
fn mark_done(
  task: &mut Task,
  step_id: &str,
  note: Option<&str>,
  actor: &str,
  at: DateTime<Utc>,
) -> Result<(), WorkflowError> {
  let step = step_mut(task, step_id)?;
  step.status = StepStatus::Done;
  step.completed_at = Some(at);
  step.completed_by = Some(actor.to_string());
  step.notes = rules::normalize_note(note);
  Ok(())
}

fn activate(task: &mut Task, step_id: &str) -> Result<(), WorkflowError> {
  step_mut(task, step_id)?.status = StepStatus::InProgress;
  task.status = TaskStatus::InProgress;
  Ok(())
}

/// Complete a non-decision step.
///
/// A terminal step closes the task; any other step hands over to its
/// order-based successor.
pub fn complete_step(
  task: &Task,
  step_id: &str,
  note: Option<&str>,
  actor: &str,
  now: DateTime<Utc>,
) -> Result<Transition, WorkflowError> {
  let resolver = StateResolver::new(task)?;
  let step = lookup(&resolver, step_id)?;
  rules::validate_actionable_state(&resolver, step)?;
  if step.is_decision {
    return Err(WorkflowError::NotADecisionAction {
      step_id: step_id.to_string(),
    });
  }
  rules::validate_complete(step, note)?;

  let next_step_id = if step.is_terminal {
    None
  } else {
    let next = resolver
      .graph()
      .successor(step)
      .ok_or_else(|| GraphError::MissingSuccessor {
        step_id: step_id.to_string(),
      })?;
    Some(next.step_id.clone())
  };

  let at = completion_time(task, now);
  let mut next = task.clone();
  mark_done(&mut next, step_id, note, actor, at)?;

  let mut events = vec![WorkflowEvent::StepCompleted {
    task_id: task.task_id.clone(),
    step_id: step_id.to_string(),
    actor: actor.to_string(),
    next_step_id: next_step_id.clone(),
  }];

  match next_step_id {
    Some(next_id) => activate(&mut next, &next_id)?,
    None => {
      next.status = TaskStatus::Done;
      next.completed_at = Some(at);
      events.push(WorkflowEvent::TaskCompleted {
        task_id: task.task_id.clone(),
        actor: actor.to_string(),
      });
    }
  }

  Ok(Transition { task: next, events })
}

/// Answer a decision step and move to the branch the answer selects.
pub fn make_decision(
  task: &Task,
  step_id: &str,
  answer: &str,
  note: Option<&str>,
  actor: &str,
  now: DateTime<Utc>,
) -> Result<Transition, WorkflowError> {
  let resolver = StateResolver::new(task)?;
  let step = lookup(&resolver, step_id)?;
  rules::validate_actionable_state(&resolver, step)?;
  let answer = rules::validate_decision(step, answer, note)?;
  let target = resolver.graph().decision_successor(step, answer)?;

  let at = completion_time(task, now);
  let mut next = task.clone();
  mark_done(&mut next, step_id, note, actor, at)?;
  step_mut(&mut next, step_id)?.decision_answer = Some(answer);
  activate(&mut next, &target.step_id)?;

  Ok(Transition {
    task: next,
    events: vec![WorkflowEvent::DecisionMade {
      task_id: task.task_id.clone(),
      step_id: step_id.to_string(),
      answer,
      actor: actor.to_string(),
      next_step_id: target.step_id.clone(),
    }],
  })
}

/// Roll progress back to a previously completed step.
///
/// `to_step_id` and every step completed after it return to `New`, as does
/// the step currently in progress. `to_step_id` then becomes current again.
/// Works on finished tasks too, reopening them.
pub fn go_back(task: &Task, to_step_id: &str, actor: &str) -> Result<Transition, WorkflowError> {
  let resolver = StateResolver::new(task)?;
  let target = lookup(&resolver, to_step_id)?;
  if !target.is_done() {
    return Err(WorkflowError::StepNotCompleted {
      step_id: to_step_id.to_string(),
    });
  }

  let completed = resolver.completed_steps();
  let position = completed
    .iter()
    .position(|s| s.step_id == to_step_id)
    .ok_or_else(|| WorkflowError::StepNotCompleted {
      step_id: to_step_id.to_string(),
    })?;
  let reset_step_ids: Vec<String> = completed[position..]
    .iter()
    .map(|s| s.step_id.clone())
    .collect();
  let in_progress: Vec<String> = task
    .steps
    .iter()
    .filter(|s| s.status == StepStatus::InProgress)
    .map(|s| s.step_id.clone())
    .collect();

  let mut next = task.clone();
  for step_id in reset_step_ids.iter().chain(&in_progress) {
    step_mut(&mut next, step_id)?.reset();
  }
  activate(&mut next, to_step_id)?;
  next.completed_at = None;

  Ok(Transition {
    task: next,
    events: vec![WorkflowEvent::SteppedBack {
      task_id: task.task_id.clone(),
      step_id: to_step_id.to_string(),
      actor: actor.to_string(),
      reset_step_ids,
    }],
  })
}
