//! Run State Persistence
//!
//! Saves progress after every job so an interrupted or failed run can
//! resume. State lives in `<state dir>/{workflow_stem}.state`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Persistent state for a workflow run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RunState {
    /// Path to the workflow file this state belongs to
    pub workflow_path: String,

    /// Jobs that completed successfully
    pub completed_jobs: BTreeSet<String>,

    /// Job that failed, if any
    pub failed_job: Option<String>,

    /// Artifacts each completed job uploaded
    #[serde(default)]
    pub artifacts: BTreeMap<String, Vec<String>>,

    /// Last time the state was updated
    pub timestamp: DateTime<Utc>,
}

impl RunState {
    pub fn new(workflow_path: impl Into<String>) -> Self {
        Self {
            workflow_path: workflow_path.into(),
            completed_jobs: BTreeSet::new(),
            failed_job: None,
            artifacts: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Returns the state file path for a workflow inside `state_dir`.
    pub fn state_file_path(state_dir: &Path, workflow_path: &str) -> PathBuf {
        let stem = Path::new(workflow_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("workflow");

        state_dir.join(format!("{}.state", stem))
    }

    /// Saves the state into `state_dir`, creating it if needed.
    pub fn save(&self, state_dir: &Path) -> Result<(), EngineError> {
        fs::create_dir_all(state_dir).map_err(|e| {
            EngineError::State(format!("cannot create '{}': {}", state_dir.display(), e))
        })?;

        let state_file = Self::state_file_path(state_dir, &self.workflow_path);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::State(e.to_string()))?;
        fs::write(&state_file, json).map_err(|e| {
            EngineError::State(format!("cannot write '{}': {}", state_file.display(), e))
        })?;

        info!("Saved run state to {}", state_file.display());
        Ok(())
    }

    /// Loads the state for a workflow, if one was saved.
    pub fn load(state_dir: &Path, workflow_path: &str) -> Result<Option<Self>, EngineError> {
        let state_file = Self::state_file_path(state_dir, workflow_path);
        if !state_file.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&state_file).map_err(|e| {
            EngineError::State(format!("cannot read '{}': {}", state_file.display(), e))
        })?;
        let state: RunState = serde_json::from_str(&content).map_err(|e| {
            EngineError::State(format!("corrupt state '{}': {}", state_file.display(), e))
        })?;

        info!("Loaded run state from {}", state_file.display());
        info!("Previously completed: {:?}", state.completed_jobs);

        Ok(Some(state))
    }

    /// Marks a job as completed along with the artifacts it uploaded.
    pub fn mark_completed(&mut self, job_id: &str, artifacts: Vec<String>) {
        self.completed_jobs.insert(job_id.to_string());
        self.artifacts.insert(job_id.to_string(), artifacts);
        if self.failed_job.as_deref() == Some(job_id) {
            self.failed_job = None;
        }
        self.timestamp = Utc::now();
    }

    pub fn mark_failed(&mut self, job_id: &str) {
        self.completed_jobs.remove(job_id);
        self.artifacts.remove(job_id);
        self.failed_job = Some(job_id.to_string());
        self.timestamp = Utc::now();
    }

    /// Returns true if this state carries progress from an earlier run.
    pub fn is_resume(&self) -> bool {
        !self.completed_jobs.is_empty() || self.failed_job.is_some()
    }

    /// Artifacts recorded for a job.
    pub fn artifacts_of(&self, job_id: &str) -> &[String] {
        self.artifacts.get(job_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Deletes the state file.
    pub fn delete(&self, state_dir: &Path) -> Result<(), EngineError> {
        let state_file = Self::state_file_path(state_dir, &self.workflow_path);
        if state_file.exists() {
            fs::remove_file(&state_file).map_err(|e| {
                EngineError::State(format!("cannot delete '{}': {}", state_file.display(), e))
            })?;
            info!("Deleted state file: {}", state_file.display());
        }
        Ok(())
    }
}
