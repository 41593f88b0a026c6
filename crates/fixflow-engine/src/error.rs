//! Engine error types.

use fixflow_config::TemplateError;
use fixflow_store::StoreError;
use fixflow_workflow::{GraphError, WorkflowError};

/// Errors returned by workflow engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  /// A workflow rule rejected the action, or the step graph is invalid.
  #[error(transparent)]
  Workflow(#[from] WorkflowError),

  /// No task with this id exists in the store.
  #[error("task not found: {task_id}")]
  TaskNotFound { task_id: String },

  /// The task template is malformed.
  #[error("invalid task template: {0}")]
  Template(#[from] TemplateError),

  /// The store failed; nothing was committed.
  #[error("persistence failed: {source}")]
  Persistence {
    #[source]
    source: StoreError,
  },
}

impl From<GraphError> for EngineError {
  fn from(err: GraphError) -> Self {
    EngineError::Workflow(WorkflowError::InvalidGraph(err))
  }
}

impl From<StoreError> for EngineError {
  fn from(source: StoreError) -> Self {
    EngineError::Persistence { source }
  }
}

impl EngineError {
  /// Whether this error points at broken data or infrastructure rather than
  /// a rejected user action.
  pub fn is_exceptional(&self) -> bool {
    matches!(
      self,
      EngineError::Workflow(WorkflowError::InvalidGraph(_)) | EngineError::Persistence { .. }
    )
  }

  /// The workflow rule violation, if that is what this is.
  pub fn as_workflow(&self) -> Option<&WorkflowError> {
    match self {
      EngineError::Workflow(err) => Some(err),
      _ => None,
    }
  }
}
