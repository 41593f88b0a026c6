use thiserror::Error;

/// Errors in a task template definition.
#[derive(Debug, Error)]
pub enum TemplateError {
  /// The template could not be parsed.
  #[error("invalid template JSON: {0}")]
  Parse(#[from] serde_json::Error),

  /// Two steps share the same key.
  #[error("duplicate step key: {key}")]
  DuplicateStepKey { key: String },

  /// A decision edge names a key that no step has.
  #[error("step '{key}' references unknown step key '{target}'")]
  UnknownStepKey { key: String, target: String },
}
