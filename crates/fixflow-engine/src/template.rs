//! Turning task templates into concrete steps.

use std::collections::HashMap;

use fixflow_config::{StepKind, TaskTemplate, TemplateError};
use fixflow_workflow::TaskStep;
use uuid::Uuid;

/// Descriptive fields for a new task. Steps come from a template.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
  pub title: String,
  pub description: String,
  pub defect_id: String,
  pub product_version: Option<String>,
}

/// Instantiate a template's steps for `task_id`.
///
/// Every step gets a fresh id; decision edges are rewritten from template
/// keys to those ids. All steps start out `New`.
pub fn instantiate(template: &TaskTemplate, task_id: &str) -> Result<Vec<TaskStep>, TemplateError> {
  template.validate()?;

  let ids: HashMap<&str, String> = template
    .steps
    .iter()
    .map(|def| (def.key.as_str(), Uuid::new_v4().to_string()))
    .collect();
  let id_for = |key: &str, target: &str| {
    ids
      .get(target)
      .cloned()
      .ok_or_else(|| TemplateError::UnknownStepKey {
        key: key.to_string(),
        target: target.to_string(),
      })
  };

  template
    .steps
    .iter()
    .map(|def| {
      let mut step = TaskStep::action(id_for(&def.key, &def.key)?, task_id, &def.action, def.order)
        .with_description(&def.description);
      if def.requires_note {
        step = step.with_note_required();
      }
      step = match &def.kind {
        StepKind::Action => step,
        StepKind::Decision { if_yes, if_no } => {
          step.decision(id_for(&def.key, if_yes)?, id_for(&def.key, if_no)?)
        }
        StepKind::Terminal => step.terminal(),
      };
      Ok(step)
    })
    .collect()
}
