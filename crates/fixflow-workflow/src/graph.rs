use std::collections::{HashMap, HashSet};

use crate::error::GraphError;
use crate::types::{DecisionAnswer, StepStatus, Task, TaskStatus, TaskStep};

/// Validated view over a task's steps for structural queries.
///
/// Construction checks the graph and fails fast with a [`GraphError`]:
/// - step ids and orders are unique, and every step belongs to the task
/// - decision steps have both edges, pointing forward to steps of the same task
/// - non-decision steps have no decision edges, terminal steps have no edges at all
/// - every non-terminal step has a successor (by order or by both decision edges)
///
/// Decision edges must point to a higher `order`, so the graph is acyclic.
#[derive(Debug, Clone)]
pub struct StepGraph<'a> {
  task_id: &'a str,
  steps: &'a [TaskStep],
  /// step_id -> index into `steps`.
  index: HashMap<&'a str, usize>,
  /// Indices into `steps`, ascending by `order`.
  by_order: Vec<usize>,
  /// Steps that are only reachable through a decision edge.
  decision_targets: HashSet<&'a str>,
}

impl<'a> StepGraph<'a> {
  /// Build and structurally validate the graph for `task_id`.
  pub fn new(task_id: &'a str, steps: &'a [TaskStep]) -> Result<Self, GraphError> {
    let mut index = HashMap::with_capacity(steps.len());
    let mut orders: HashMap<i32, &str> = HashMap::with_capacity(steps.len());

    for (i, step) in steps.iter().enumerate() {
      if step.task_id != task_id {
        return Err(GraphError::ForeignStep {
          step_id: step.step_id.clone(),
          owner: step.task_id.clone(),
          task_id: task_id.to_string(),
        });
      }
      if index.insert(step.step_id.as_str(), i).is_some() {
        return Err(GraphError::DuplicateStepId {
          step_id: step.step_id.clone(),
        });
      }
      if let Some(first) = orders.insert(step.order, step.step_id.as_str()) {
        return Err(GraphError::DuplicateOrder {
          order: step.order,
          first: first.to_string(),
          second: step.step_id.clone(),
        });
      }
    }

    let mut by_order: Vec<usize> = (0..steps.len()).collect();
    by_order.sort_by_key(|&i| steps[i].order);

    let max_order = by_order.last().map(|&i| steps[i].order);
    let mut decision_targets = HashSet::new();

    for step in steps {
      if step.is_terminal && step.is_decision {
        return Err(GraphError::ConflictingFlags {
          step_id: step.step_id.clone(),
        });
      }
      if step.is_terminal {
        if step.has_decision_edges() {
          return Err(GraphError::TerminalHasEdges {
            step_id: step.step_id.clone(),
          });
        }
        continue;
      }

      if step.is_decision {
        for answer in [DecisionAnswer::Yes, DecisionAnswer::No] {
          let target = step.edge(answer).ok_or_else(|| GraphError::MissingDecisionEdge {
            step_id: step.step_id.clone(),
            answer,
          })?;
          let target_idx = *index.get(target).ok_or_else(|| GraphError::DanglingEdge {
            step_id: step.step_id.clone(),
            target: target.to_string(),
          })?;
          if steps[target_idx].order <= step.order {
            return Err(GraphError::BackwardEdge {
              step_id: step.step_id.clone(),
              target: target.to_string(),
            });
          }
          decision_targets.insert(steps[target_idx].step_id.as_str());
        }
      } else {
        if step.has_decision_edges() {
          return Err(GraphError::UnexpectedDecisionEdge {
            step_id: step.step_id.clone(),
          });
        }
        if max_order.is_none_or(|max| max <= step.order) {
          return Err(GraphError::MissingSuccessor {
            step_id: step.step_id.clone(),
          });
        }
      }
    }

    Ok(Self {
      task_id,
      steps,
      index,
      by_order,
      decision_targets,
    })
  }

  /// Build the graph for a task and check that the task status agrees with it.
  pub fn for_task(task: &'a Task) -> Result<Self, GraphError> {
    let graph = Self::new(&task.task_id, &task.steps)?;
    graph.check_status(task.status)?;
    Ok(graph)
  }

  /// Check the runtime state of the steps against the task status.
  ///
  /// At most one step may be in progress. A `Done` task has none and has a
  /// completed terminal step; an `InProgress` task has exactly one; a `New`
  /// task has no completed steps.
  pub fn check_status(&self, status: TaskStatus) -> Result<(), GraphError> {
    let in_progress: Vec<&TaskStep> = self
      .steps
      .iter()
      .filter(|s| s.status == StepStatus::InProgress)
      .collect();

    if in_progress.len() > 1 {
      return Err(GraphError::MultipleCurrentSteps {
        step_ids: in_progress.iter().map(|s| s.step_id.clone()).collect(),
      });
    }

    let inconsistent = |reason: &str| GraphError::InconsistentStatus {
      reason: reason.to_string(),
    };

    match status {
      TaskStatus::Done => {
        if !in_progress.is_empty() {
          return Err(inconsistent("done task still has a step in progress"));
        }
        if !self.steps.iter().any(|s| s.is_terminal && s.is_done()) {
          return Err(inconsistent("done task has no completed terminal step"));
        }
      }
      TaskStatus::InProgress => {
        if in_progress.is_empty() {
          return Err(inconsistent("task in progress has no current step"));
        }
      }
      TaskStatus::New => {
        if self.steps.iter().any(|s| s.is_done()) {
          return Err(inconsistent("new task has completed steps"));
        }
      }
    }

    Ok(())
  }

  pub fn task_id(&self) -> &'a str {
    self.task_id
  }

  pub fn steps(&self) -> &'a [TaskStep] {
    self.steps
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  pub fn get(&self, step_id: &str) -> Option<&'a TaskStep> {
    self.index.get(step_id).map(|&i| &self.steps[i])
  }

  /// Steps in ascending `order`.
  pub fn ordered(&self) -> impl Iterator<Item = &'a TaskStep> + '_ {
    self.by_order.iter().map(|&i| &self.steps[i])
  }

  /// Whether some decision step leads to this step.
  pub fn is_decision_target(&self, step_id: &str) -> bool {
    self.decision_targets.contains(step_id)
  }

  /// Order-based successor for a linear step: the `New` step with the
  /// smallest `order` greater than `step.order`.
  pub fn successor(&self, step: &TaskStep) -> Option<&'a TaskStep> {
    self
      .ordered()
      .find(|s| s.order > step.order && s.status == StepStatus::New)
  }

  /// The step selected by answering a decision step.
  pub fn decision_successor(
    &self,
    step: &TaskStep,
    answer: DecisionAnswer,
  ) -> Result<&'a TaskStep, GraphError> {
    if !step.is_decision {
      return Err(GraphError::NotADecision {
        step_id: step.step_id.clone(),
      });
    }
    let target = step
      .edge(answer)
      .ok_or_else(|| GraphError::MissingDecisionEdge {
        step_id: step.step_id.clone(),
        answer,
      })?;
    self.get(target).ok_or_else(|| GraphError::DanglingEdge {
      step_id: step.step_id.clone(),
      target: target.to_string(),
    })
  }

  pub fn is_terminal(step: &TaskStep) -> bool {
    step.is_terminal
  }
}
