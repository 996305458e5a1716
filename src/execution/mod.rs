//! Workflow Execution Module
//!
//! Runs a validated workflow job by job on local workspaces.
//!
//! # Architecture
//!
//! - [`engine`]: Main execution engine orchestrating workflow runs
//! - [`context`]: Expression evaluation and step outputs within a job
//! - [`actions`]: Built-in actions (checkout, generate, deploy, ...)
//! - [`shell`]: `run:` script execution

pub mod actions;
pub mod context;
pub mod engine;
pub mod shell;

pub use actions::{execute_action, ActionServices, StepOutcome, StepRequest};
pub use context::JobContext;
pub use engine::{Engine, EngineConfig, EnvironmentReport, JobReport, RunOutcome, RunReport};
