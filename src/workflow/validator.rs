//! Workflow Validation
//!
//! Provides validation for workflow structures including:
//! - Job and step field validation
//! - Action reference resolution
//! - Dependency graph validation (no cycles)
//! - Topological sorting

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, info, warn};

use super::action::{resolve_action, ResolveError};
use super::model::{Job, Workflow};
use crate::error::WorkflowError;

/// Validation error types for user-friendly error messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyWorkflow,
    EmptyJobId,
    JobWithoutSteps(String),
    InvalidStep {
        job: String,
        step: String,
        reason: ResolveError,
    },
    DuplicateStepId { job: String, step: String },
    UnknownNeed { job: String, need: String },
    CyclicDependency,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyWorkflow => write!(f, "Workflow has no jobs"),
            Self::EmptyJobId => write!(f, "Job has empty or whitespace-only ID"),
            Self::JobWithoutSteps(job) => write!(f, "Job '{}' has no steps", job),
            Self::InvalidStep { job, step, reason } => {
                write!(f, "Job '{}', step '{}': {}", job, step, reason)
            }
            Self::DuplicateStepId { job, step } => {
                write!(f, "Job '{}' has duplicate step ID: '{}'", job, step)
            }
            Self::UnknownNeed { job, need } => {
                write!(f, "Job '{}' needs unknown job '{}'", job, need)
            }
            Self::CyclicDependency => {
                write!(f, "Workflow contains cyclic dependencies (jobs need each other in a loop)")
            }
        }
    }
}

/// Validates a single job's fields and steps.
fn validate_job(job: &Job) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if job.id.trim().is_empty() {
        errors.push(ValidationError::EmptyJobId);
        return errors;
    }

    if job.steps.is_empty() {
        errors.push(ValidationError::JobWithoutSteps(job.id.clone()));
    }

    let mut step_ids = HashSet::new();
    for (index, step) in job.steps.iter().enumerate() {
        if let Err(reason) = resolve_action(step) {
            errors.push(ValidationError::InvalidStep {
                job: job.id.clone(),
                step: step
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("#{}", index + 1)),
                reason,
            });
        }

        if let Some(id) = &step.id {
            if !step_ids.insert(id.as_str()) {
                errors.push(ValidationError::DuplicateStepId {
                    job: job.id.clone(),
                    step: id.clone(),
                });
            }
        }

        if let Some(run) = &step.run {
            if run.trim().is_empty() {
                warn!("Job '{}': step '{}' has an empty script", job.id, step.display_name());
            }
        }
    }

    if job.needs.is_empty() {
        debug!("Job '{}' is a root job (no dependencies)", job.id);
    }

    errors
}

/// Validates the entire workflow structure.
///
/// Performs the following checks:
/// 1. Workflow is not empty
/// 2. Every job has steps, and every step maps to a known action
/// 3. Step IDs are unique within a job
/// 4. All `needs` point to existing jobs
/// 5. No cyclic dependencies
///
/// Errors are collected and reported together. On success, jobs are
/// reordered in topological order.
pub fn validate_workflow(workflow: &mut Workflow) -> Result<(), WorkflowError> {
    info!("Validating workflow with {} jobs", workflow.len());

    if workflow.is_empty() {
        return Err(WorkflowError::Invalid(
            ValidationError::EmptyWorkflow.to_string(),
        ));
    }

    if workflow.triggers.is_empty() {
        warn!("Workflow declares no triggers; it can never start");
    }

    let errors = collect_errors(workflow);
    if !errors.is_empty() {
        let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(WorkflowError::Invalid(error_messages.join("\n")));
    }

    topological_sort(workflow)
        .map_err(|e| WorkflowError::Invalid(e.to_string()))?;

    info!(
        "Workflow validated: {} jobs, {} steps",
        workflow.len(),
        workflow.step_count()
    );
    Ok(())
}

/// Collects every validation error without modifying the workflow.
pub fn collect_errors(workflow: &Workflow) -> Vec<ValidationError> {
    if workflow.is_empty() {
        return vec![ValidationError::EmptyWorkflow];
    }

    let job_ids: HashSet<&str> = workflow.jobs.iter().map(|j| j.id.as_str()).collect();
    let mut all_errors = Vec::new();

    for job in &workflow.jobs {
        all_errors.extend(validate_job(job));

        for need in &job.needs {
            if !job_ids.contains(need.as_str()) {
                all_errors.push(ValidationError::UnknownNeed {
                    job: job.id.clone(),
                    need: need.clone(),
                });
            }
        }
    }

    all_errors
}

/// Performs topological sort on workflow jobs using Kahn's algorithm.
///
/// Ties keep declaration order. Also detects cyclic dependencies.
fn topological_sort(workflow: &mut Workflow) -> Result<(), ValidationError> {
    let mut in_degree: HashMap<String, usize> = HashMap::new();
    for job in &workflow.jobs {
        in_degree.insert(job.id.clone(), job.needs.len());
    }

    let mut queue: VecDeque<String> = workflow
        .jobs
        .iter()
        .filter(|j| j.needs.is_empty())
        .map(|j| j.id.clone())
        .collect();

    let mut sorted_order: Vec<String> = Vec::new();

    while let Some(current_id) = queue.pop_front() {
        sorted_order.push(current_id.clone());

        // Successors in declaration order
        for job in &workflow.jobs {
            let edges = job.needs.iter().filter(|n| **n == current_id).count();
            if edges == 0 {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(&job.id) {
                *degree -= edges;
                if *degree == 0 {
                    queue.push_back(job.id.clone());
                }
            }
        }
    }

    if sorted_order.len() != workflow.jobs.len() {
        return Err(ValidationError::CyclicDependency);
    }

    let mut job_map: HashMap<String, Job> = workflow
        .jobs
        .drain(..)
        .map(|j| (j.id.clone(), j))
        .collect();

    workflow.jobs = sorted_order
        .iter()
        .filter_map(|id| job_map.remove(id))
        .collect();

    debug!("Topological order: {:?}", sorted_order);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::Step;

    fn build_job(id: &str) -> Job {
        Job::new(id).with_step(Step::script("echo build"))
    }

    #[test]
    fn test_valid_workflow_sorted() {
        let mut workflow = Workflow::from_jobs(vec![
            build_job("deploy").depends_on("build"),
            build_job("build"),
        ]);

        assert!(validate_workflow(&mut workflow).is_ok());
        assert_eq!(workflow.jobs[0].id, "build");
        assert_eq!(workflow.jobs[1].id, "deploy");
    }

    #[test]
    fn test_independent_jobs_keep_declaration_order() {
        let mut workflow = Workflow::from_jobs(vec![
            build_job("lint"),
            build_job("build"),
            build_job("deploy").depends_on("lint").depends_on("build"),
        ]);

        validate_workflow(&mut workflow).unwrap();
        let ids: Vec<&str> = workflow.jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["lint", "build", "deploy"]);
    }

    #[test]
    fn test_empty_workflow() {
        let mut workflow = Workflow::new();
        let err = validate_workflow(&mut workflow).unwrap_err();
        assert!(err.to_string().contains("no jobs"));
    }

    #[test]
    fn test_job_without_steps() {
        let workflow = Workflow::from_jobs(vec![Job::new("build")]);
        let errors = collect_errors(&workflow);
        assert_eq!(errors, vec![ValidationError::JobWithoutSteps("build".to_string())]);
    }

    #[test]
    fn test_step_with_both_uses_and_run() {
        let mut step = Step::action("actions/checkout@v4");
        step.run = Some("echo".to_string());
        let workflow = Workflow::from_jobs(vec![Job::new("build").with_step(step)]);

        let errors = collect_errors(&workflow);
        assert!(matches!(
            &errors[0],
            ValidationError::InvalidStep { reason: ResolveError::Ambiguous, step, .. } if step == "#1"
        ));
    }

    #[test]
    fn test_unsupported_action() {
        let workflow = Workflow::from_jobs(vec![Job::new("build")
            .with_step(Step::action("someone/mystery@v1").with_id("mystery"))]);

        let errors = collect_errors(&workflow);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("someone/mystery@v1"));
        assert!(errors[0].to_string().contains("mystery"));
    }

    #[test]
    fn test_duplicate_step_ids() {
        let workflow = Workflow::from_jobs(vec![Job::new("build")
            .with_step(Step::script("echo 1").with_id("same"))
            .with_step(Step::script("echo 2").with_id("same"))]);

        let errors = collect_errors(&workflow);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateStepId { .. })));
    }

    #[test]
    fn test_unknown_need() {
        let mut workflow = Workflow::from_jobs(vec![build_job("deploy").depends_on("build")]);

        let err = validate_workflow(&mut workflow).unwrap_err();
        assert!(err.to_string().contains("needs unknown job 'build'"));
    }

    #[test]
    fn test_errors_reported_together() {
        let mut workflow = Workflow::from_jobs(vec![
            Job::new("build"),
            build_job("deploy").depends_on("ghost"),
        ]);

        let message = validate_workflow(&mut workflow).unwrap_err().to_string();
        assert!(message.contains("has no steps"));
        assert!(message.contains("ghost"));
    }

    #[test]
    fn test_cyclic_dependency() {
        let mut workflow = Workflow::from_jobs(vec![
            build_job("a").depends_on("b"),
            build_job("b").depends_on("a"),
        ]);

        let err = validate_workflow(&mut workflow).unwrap_err();
        assert!(err.to_string().contains("cyclic"));
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let mut workflow = Workflow::from_jobs(vec![build_job("a").depends_on("a")]);
        assert!(validate_workflow(&mut workflow).is_err());
    }
}
