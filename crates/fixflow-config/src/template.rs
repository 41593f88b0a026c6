use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// A reusable step graph for one kind of remediation work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
  pub template_id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub description: String,
  pub steps: Vec<StepDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
  /// Template-local key, used by decision edges.
  pub key: String,
  pub action: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub description: String,
  pub order: i32,
  #[serde(flatten)]
  pub kind: StepKind,
  #[serde(default)]
  pub requires_note: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
  /// A plain step; completing it moves on to the next step by order.
  Action,
  /// A Yes/No question; the answer picks the next step.
  Decision { if_yes: String, if_no: String },
  /// Closing step; completing it ends the task.
  Terminal,
}

impl TaskTemplate {
  /// Parse and check a template from JSON.
  pub fn from_json(content: &str) -> Result<Self, TemplateError> {
    let template: TaskTemplate = serde_json::from_str(content)?;
    template.validate()?;
    Ok(template)
  }

  /// Check that keys are unique and decision edges name existing keys.
  ///
  /// Graph shape (orders, successors, terminal edges) is checked when the
  /// instantiated steps are loaded into a step graph.
  pub fn validate(&self) -> Result<(), TemplateError> {
    let mut keys = HashSet::new();
    for step in &self.steps {
      if !keys.insert(step.key.as_str()) {
        return Err(TemplateError::DuplicateStepKey {
          key: step.key.clone(),
        });
      }
    }

    for step in &self.steps {
      if let StepKind::Decision { if_yes, if_no } = &step.kind {
        for target in [if_yes, if_no] {
          if !keys.contains(target.as_str()) {
            return Err(TemplateError::UnknownStepKey {
              key: step.key.clone(),
              target: target.clone(),
            });
          }
        }
      }
    }

    Ok(())
  }
}
