//! Fixflow Config
//!
//! This crate contains the serializable task template types. A template
//! describes the step graph a remediation task follows, using template-local
//! step keys for decision edges. Templates are loaded from JSON files (via the
//! CLI) and instantiated into concrete task steps by the engine, which assigns
//! fresh step ids.

mod error;
mod template;

pub use error::TemplateError;
pub use template::{StepDef, StepKind, TaskTemplate};
