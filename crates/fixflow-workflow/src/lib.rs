//! Fixflow Workflow
//!
//! This crate holds the task model and everything that can be answered about a
//! task without touching storage:
//! - [`StepGraph`]: structural queries and load-time validation of a step list
//! - [`rules`]: whether a proposed action on a step is permitted
//! - [`StateResolver`]: current step, completion order and next-step preview
//! - [`ProgressSummary`]: counts and percentages for reporting
//!
//! State changes live in `fixflow-engine`.

mod error;
mod graph;
mod progress;
pub mod rules;
mod state;
mod types;

pub use error::{GraphError, ParseValueError, WorkflowError};
pub use graph::StepGraph;
pub use progress::{ProgressReport, ProgressSummary, RollupSummary, TaskSummary, percentage};
pub use state::{PreviewEntry, StateResolver, WorkflowState};
pub use types::{DecisionAnswer, StepStatus, Task, TaskNote, TaskStatus, TaskStep};
