//! Execution Planner
//!
//! Manages job scheduling for a workflow run:
//! - Dependency tracking through `needs`
//! - Job status tracking
//! - Blocking of jobs downstream of a failure

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use log::{debug, info};

use super::model::{Job, Workflow};
use super::state::RunState;

/// Status of a job during execution.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Job is waiting for dependencies
    Pending,
    /// Job is currently executing
    Running,
    /// Job completed successfully
    Completed,
    /// Job failed with error message
    Failed(String),
    /// Job completed in an earlier run and was not re-run
    Skipped,
    /// Job can never run because a job it needs failed
    Blocked,
}

/// Execution metrics for a single job.
#[derive(Debug, Clone)]
pub struct JobMetrics {
    pub start_time: Option<Instant>,
    pub end_time: Option<Instant>,
    pub duration_ms: Option<u128>,
    pub status: JobStatus,
}

impl JobMetrics {
    fn new() -> Self {
        Self {
            start_time: None,
            end_time: None,
            duration_ms: None,
            status: JobStatus::Pending,
        }
    }

    fn finish(&mut self, status: JobStatus) {
        let now = Instant::now();
        self.end_time = Some(now);
        if let Some(start) = self.start_time {
            self.duration_ms = Some(now.duration_since(start).as_millis());
        }
        self.status = status;
    }
}

/// Tracks which jobs are done and which can run next.
pub struct ExecutionPlanner {
    workflow: Workflow,
    completed_jobs: HashSet<String>,
    running_jobs: HashSet<String>,
    /// Jobs that failed or can no longer run
    blocked_jobs: HashSet<String>,
    job_metrics: HashMap<String, JobMetrics>,
}

impl ExecutionPlanner {
    /// Creates a new execution planner for a validated workflow.
    pub fn new(workflow: Workflow) -> Self {
        info!("Creating planner for {} jobs", workflow.len());

        let job_metrics = workflow
            .jobs
            .iter()
            .map(|job| (job.id.clone(), JobMetrics::new()))
            .collect();

        Self {
            workflow,
            completed_jobs: HashSet::new(),
            running_jobs: HashSet::new(),
            blocked_jobs: HashSet::new(),
            job_metrics,
        }
    }

    /// Creates a planner that resumes from a previous run.
    ///
    /// Only jobs listed in `resumable` are treated as done; the caller
    /// decides which completed jobs still have their artifacts.
    pub fn from_state(workflow: Workflow, state: &RunState, resumable: &HashSet<String>) -> Self {
        let mut planner = Self::new(workflow);

        for job_id in &state.completed_jobs {
            if !resumable.contains(job_id) || planner.workflow.get_job(job_id).is_none() {
                continue;
            }
            planner.completed_jobs.insert(job_id.clone());
            if let Some(metrics) = planner.job_metrics.get_mut(job_id) {
                metrics.status = JobStatus::Skipped;
            }
            info!("Skipping previously completed job: {}", job_id);
        }

        planner
    }

    /// Returns jobs that are ready to execute, in workflow order.
    ///
    /// A job is ready if it hasn't started, isn't blocked, and every job
    /// it needs has completed.
    pub fn get_ready_jobs(&self) -> Vec<Job> {
        self.workflow
            .jobs
            .iter()
            .filter(|job| {
                !self.completed_jobs.contains(&job.id)
                    && !self.running_jobs.contains(&job.id)
                    && !self.blocked_jobs.contains(&job.id)
            })
            .filter(|job| job.needs.iter().all(|dep| self.completed_jobs.contains(dep)))
            .cloned()
            .collect()
    }

    pub fn mark_job_running(&mut self, job_id: &str) {
        self.running_jobs.insert(job_id.to_string());
        if let Some(metrics) = self.job_metrics.get_mut(job_id) {
            metrics.start_time = Some(Instant::now());
            metrics.status = JobStatus::Running;
        }
    }

    pub fn mark_job_completed(&mut self, job_id: &str) {
        self.running_jobs.remove(job_id);
        self.completed_jobs.insert(job_id.to_string());
        if let Some(metrics) = self.job_metrics.get_mut(job_id) {
            metrics.finish(JobStatus::Completed);
        }
    }

    /// Marks a job as failed and blocks everything downstream of it.
    pub fn mark_job_failed(&mut self, job_id: &str, error: String) {
        self.running_jobs.remove(job_id);
        self.blocked_jobs.insert(job_id.to_string());
        if let Some(metrics) = self.job_metrics.get_mut(job_id) {
            metrics.finish(JobStatus::Failed(error));
        }

        for dependent in self.workflow.dependents_of(job_id) {
            debug!("Job '{}' blocked by failure of '{}'", dependent, job_id);
            if let Some(metrics) = self.job_metrics.get_mut(&dependent) {
                metrics.status = JobStatus::Blocked;
            }
            self.blocked_jobs.insert(dependent);
        }
    }

    /// Returns true if any job can still run.
    pub fn has_work_remaining(&self) -> bool {
        self.completed_jobs.len() + self.blocked_jobs.len() < self.workflow.len()
    }

    /// Returns the current progress as (completed, total).
    pub fn progress(&self) -> (usize, usize) {
        (self.completed_jobs.len(), self.workflow.len())
    }

    pub fn status(&self, job_id: &str) -> Option<&JobStatus> {
        self.job_metrics.get(job_id).map(|m| &m.status)
    }

    pub fn get_metrics(&self) -> &HashMap<String, JobMetrics> {
        &self.job_metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::Step;

    fn create_test_workflow() -> Workflow {
        let mut workflow = Workflow::new();
        workflow
            .add_job(Job::new("build").with_step(Step::script("echo build")))
            .unwrap();
        workflow
            .add_job(
                Job::new("deploy")
                    .depends_on("build")
                    .with_step(Step::action("actions/deploy-pages@v4")),
            )
            .unwrap();
        workflow
    }

    fn ids(jobs: &[Job]) -> Vec<&str> {
        jobs.iter().map(|j| j.id.as_str()).collect()
    }

    #[test]
    fn test_planner_creation() {
        let planner = ExecutionPlanner::new(create_test_workflow());
        assert_eq!(planner.progress(), (0, 2));
        assert_eq!(planner.status("build"), Some(&JobStatus::Pending));
    }

    #[test]
    fn test_planner_get_ready_jobs() {
        let planner = ExecutionPlanner::new(create_test_workflow());
        assert_eq!(ids(&planner.get_ready_jobs()), vec!["build"]);
    }

    #[test]
    fn test_planner_deploy_ready_after_build() {
        let mut planner = ExecutionPlanner::new(create_test_workflow());

        planner.mark_job_running("build");
        assert!(planner.get_ready_jobs().is_empty());
        assert_eq!(planner.status("build"), Some(&JobStatus::Running));

        planner.mark_job_completed("build");
        assert_eq!(ids(&planner.get_ready_jobs()), vec!["deploy"]);
        assert_eq!(planner.progress(), (1, 2));
    }

    #[test]
    fn test_planner_failure_blocks_dependents() {
        let mut planner = ExecutionPlanner::new(create_test_workflow());

        planner.mark_job_running("build");
        planner.mark_job_failed("build", "exit 1".to_string());

        assert!(planner.get_ready_jobs().is_empty());
        assert!(!planner.has_work_remaining());
        assert_eq!(planner.status("deploy"), Some(&JobStatus::Blocked));
        match planner.status("build") {
            Some(JobStatus::Failed(msg)) => assert_eq!(msg, "exit 1"),
            other => panic!("Expected Failed status, got {:?}", other),
        }
    }

    #[test]
    fn test_planner_failure_leaves_independent_jobs() {
        let mut workflow = create_test_workflow();
        workflow
            .add_job(Job::new("lint").with_step(Step::script("echo lint")))
            .unwrap();
        let mut planner = ExecutionPlanner::new(workflow);

        planner.mark_job_running("build");
        planner.mark_job_failed("build", "boom".to_string());

        assert!(planner.has_work_remaining());
        assert_eq!(ids(&planner.get_ready_jobs()), vec!["lint"]);
    }

    #[test]
    fn test_planner_has_work_remaining() {
        let mut planner = ExecutionPlanner::new(create_test_workflow());
        assert!(planner.has_work_remaining());

        for job in ["build", "deploy"] {
            planner.mark_job_running(job);
            planner.mark_job_completed(job);
        }
        assert!(!planner.has_work_remaining());
        assert_eq!(planner.progress(), (2, 2));
    }

    #[test]
    fn test_planner_metrics_duration() {
        let mut planner = ExecutionPlanner::new(create_test_workflow());

        planner.mark_job_running("build");
        std::thread::sleep(std::time::Duration::from_millis(10));
        planner.mark_job_completed("build");

        let metrics = &planner.get_metrics()["build"];
        assert!(metrics.start_time.is_some());
        assert!(metrics.end_time.is_some());
        assert!(metrics.duration_ms.unwrap() >= 10);
    }

    #[test]
    fn test_planner_from_state() {
        let mut state = RunState::new("pages.yml");
        state.mark_completed("build", vec!["github-pages".to_string()]);
        let resumable: HashSet<String> = ["build".to_string()].into_iter().collect();

        let planner = ExecutionPlanner::from_state(create_test_workflow(), &state, &resumable);

        assert_eq!(planner.progress(), (1, 2));
        assert_eq!(planner.status("build"), Some(&JobStatus::Skipped));
        assert_eq!(ids(&planner.get_ready_jobs()), vec!["deploy"]);
    }

    #[test]
    fn test_planner_from_state_rejects_stale_jobs() {
        let mut state = RunState::new("pages.yml");
        state.mark_completed("build", vec!["github-pages".to_string()]);

        let planner = ExecutionPlanner::from_state(create_test_workflow(), &state, &HashSet::new());

        assert_eq!(planner.progress(), (0, 2));
        assert_eq!(ids(&planner.get_ready_jobs()), vec!["build"]);
    }
}
