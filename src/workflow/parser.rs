//! Workflow Parser
//!
//! Handles loading and parsing workflow definitions from YAML files.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, info};

use super::model::Workflow;
use super::validator::validate_workflow;
use crate::error::WorkflowError;

/// Loads a workflow from a YAML file.
///
/// This function:
/// 1. Reads and parses the YAML file
/// 2. Populates reverse dependencies from `needs`
/// 3. Validates the workflow structure
/// 4. Sorts jobs into execution order
///
/// # Example
///
/// ```rust,no_run
/// use poempress::workflow::load_workflow;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let workflow = load_workflow(".github/workflows/pages.yml")?;
///     println!("Loaded {} jobs", workflow.len());
///     Ok(())
/// }
/// ```
pub fn load_workflow(path: impl AsRef<Path>) -> Result<Workflow, WorkflowError> {
    let path = path.as_ref();
    info!("Loading workflow from: {}", path.display());

    let yaml_content = fs::read_to_string(path).map_err(|source| WorkflowError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("YAML content loaded ({} bytes)", yaml_content.len());
    parse_workflow(&yaml_content)
}

/// Parses, validates and orders a workflow from YAML text.
pub fn parse_workflow(yaml: &str) -> Result<Workflow, WorkflowError> {
    let mut workflow: Workflow = serde_yaml::from_str(yaml)?;

    info!(
        "Parsed {} jobs, {} steps",
        workflow.len(),
        workflow.step_count()
    );

    populate_dependencies(&mut workflow);
    validate_workflow(&mut workflow)?;

    Ok(workflow)
}

/// Fills each job's `next` list from the `needs` of the other jobs.
///
/// Unknown `needs` entries are left for the validator to report.
pub fn populate_dependencies(workflow: &mut Workflow) {
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();

    for job in &workflow.jobs {
        for need in &job.needs {
            dependents
                .entry(need.clone())
                .or_default()
                .push(job.id.clone());
        }
    }

    for job in &mut workflow.jobs {
        job.next = dependents.remove(&job.id).unwrap_or_default();
        job.next.sort();
        job.next.dedup();
        if !job.next.is_empty() {
            debug!("Job '{}' required by: {:?}", job.id, job.next);
        }
    }
}

/// Saves a workflow to a YAML file.
pub fn save_workflow(workflow: &Workflow, path: impl AsRef<Path>) -> Result<(), WorkflowError> {
    let path = path.as_ref();
    let yaml_content = serde_yaml::to_string(workflow).map_err(WorkflowError::Encode)?;
    fs::write(path, yaml_content).map_err(|source| WorkflowError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Workflow saved to: {}", path.display());
    Ok(())
}
