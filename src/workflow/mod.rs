//! Workflow Definition Module
//!
//! Provides data structures and utilities for defining, parsing and
//! validating publishing workflows.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (Workflow, Job, Step)
//! - [`triggers`]: The `on:` section and event matching
//! - [`action`]: Mapping `uses:` references to built-in actions
//! - [`parser`]: YAML parsing and loading
//! - [`validator`]: Validation rules and dependency checking
//! - [`planner`]: Job scheduling
//! - [`state`]: Run state persistence

pub mod action;
pub mod model;
pub mod parser;
pub mod planner;
pub mod state;
pub mod triggers;
pub mod validator;

pub use action::{resolve_action, ActionKind, ActionRef, ResolveError};
pub use model::{Environment, Job, Step, Workflow};
pub use parser::{load_workflow, parse_workflow, save_workflow};
pub use planner::{ExecutionPlanner, JobStatus};
pub use state::RunState;
pub use triggers::{BranchFilter, TriggerEvent, Triggers};
pub use validator::{collect_errors, validate_workflow, ValidationError};
