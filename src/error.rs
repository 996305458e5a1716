//! Error Types
//!
//! One error enum per layer. Lower layers convert into higher ones with
//! `#[from]` so callers can propagate with `?`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while parsing poems or writing the generated site.
#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Invalid media reference: '{0}'")]
    InvalidMedia(String),

    #[error("Failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Poems per page must be at least 1")]
    ZeroPageSize,
}

/// Errors raised while loading or validating a workflow definition.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Failed to read workflow file '{path}': {source}. Check that the file exists and is readable.")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse workflow YAML: {0}. Check the file format.")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to encode workflow YAML: {0}")]
    Encode(serde_yaml::Error),

    #[error("Failed to write workflow file '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("{0}")]
    Invalid(String),
}

/// Errors raised by a single step's action.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error(transparent)]
    Site(#[from] SiteError),

    #[error("I/O error on '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Required input '{0}' is missing")]
    MissingInput(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Directory '{0}' does not exist")]
    MissingDirectory(PathBuf),

    #[error("Artifact '{0}' not found")]
    ArtifactNotFound(String),

    #[error("Invalid artifact manifest for '{name}': {source}")]
    Manifest {
        name: String,
        source: serde_json::Error,
    },

    #[error("Runtime '{0}' not found on PATH")]
    RuntimeNotFound(String),

    #[error("Runtime '{runtime}' version {found} does not satisfy '{required}'")]
    RuntimeVersion {
        runtime: String,
        found: String,
        required: String,
    },

    #[error("Command failed with exit code {code:?}")]
    CommandFailed { code: Option<i32> },
}

impl ActionError {
    /// Wraps an I/O error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by the execution engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Job '{job}' failed at step '{step}': {source}")]
    StepFailed {
        job: String,
        step: String,
        source: ActionError,
    },

    #[error("Failed to prepare workspace '{path}': {source}")]
    Workspace { path: PathBuf, source: io::Error },

    #[error("Failed to persist run state: {0}")]
    State(String),

    #[error("Invalid engine configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Planning(String),
}

pub type SiteResult<T> = std::result::Result<T, SiteError>;
pub type ActionResult<T> = std::result::Result<T, ActionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failed_message_includes_job_and_step() {
        let err = EngineError::StepFailed {
            job: "build".to_string(),
            step: "Generate".to_string(),
            source: ActionError::MissingInput("poems.txt".to_string()),
        };

        let message = err.to_string();
        assert!(message.contains("build"));
        assert!(message.contains("Generate"));
        assert!(message.contains("poems.txt"));
    }

    #[test]
    fn test_site_error_converts_into_action_error() {
        let err: ActionError = SiteError::InvalidMedia("[300]".to_string()).into();
        assert_eq!(err.to_string(), "Invalid media reference: '[300]'");
    }
}
