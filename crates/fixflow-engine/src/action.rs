use fixflow_workflow::{TaskNote, WorkflowState};
use serde::{Deserialize, Serialize};

/// A user action on a task, as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
  Complete {
    step_id: String,
    #[serde(default)]
    note: Option<String>,
  },
  DecideYes {
    step_id: String,
    #[serde(default)]
    note: Option<String>,
  },
  DecideNo {
    step_id: String,
    #[serde(default)]
    note: Option<String>,
  },
  GoBack {
    step_id: String,
  },
  AddNote {
    content: String,
  },
}

impl Action {
  pub fn name(&self) -> &'static str {
    match self {
      Action::Complete { .. } => "complete",
      Action::DecideYes { .. } => "decide_yes",
      Action::DecideNo { .. } => "decide_no",
      Action::GoBack { .. } => "go_back",
      Action::AddNote { .. } => "add_note",
    }
  }
}

/// What an applied action produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionOutcome {
  State(WorkflowState),
  Note(TaskNote),
}
