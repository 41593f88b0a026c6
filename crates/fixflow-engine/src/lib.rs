//! Fixflow Engine
//!
//! This crate applies user actions to guided remediation tasks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowEngine                         │
//! │  - one write lock per task, lock-free committed snapshots   │
//! │  - persist first, then commit and emit events               │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        transition                           │
//! │  - complete_step / make_decision / go_back                  │
//! │  - pure: (task, action) -> next task + events               │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 fixflow-workflow (read-only)                │
//! │  - StepGraph validation, rules, StateResolver               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use fixflow_engine::WorkflowEngine;
//! use fixflow_store::SqliteStore;
//!
//! let store = Arc::new(SqliteStore::open("fixflow.db").await?);
//! let engine = WorkflowEngine::new(store);
//!
//! let state = engine.get_state(&task_id).await?;
//! if let Some(step) = state.current_step {
//!   engine.complete_step(&task_id, &step.step_id, Some("done"), "alice").await?;
//! }
//! ```

mod action;
mod engine;
mod error;
mod events;
mod template;
pub mod transition;

pub use action::{Action, ActionOutcome};
pub use engine::WorkflowEngine;
pub use error::EngineError;
pub use events::{ChannelNotifier, NoopNotifier, WorkflowEvent, WorkflowNotifier};
pub use template::{NewTask, instantiate};
