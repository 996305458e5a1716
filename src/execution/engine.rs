//! Workflow Execution Engine
//!
//! The core engine that orchestrates a workflow run:
//! - Trigger matching against the incoming event
//! - Job scheduling through `needs`
//! - A fresh workspace per job, standing in for an ephemeral runner
//! - Artifact hand-off between jobs
//! - State persistence for resuming failed runs

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{error, info, warn};

use super::actions::{execute_action, ActionServices, StepRequest};
use super::context::JobContext;
use crate::error::EngineError;
use crate::monitoring::{EventType, ExecutionTimeline};
use crate::publish::{ArtifactStore, HostingTarget};
use crate::workflow::{
    resolve_action, ExecutionPlanner, Job, JobStatus, RunState, TriggerEvent, Workflow,
};

/// Run directory used when none is configured, relative to the working directory.
pub const DEFAULT_RUN_DIR: &str = ".poempress";

/// Settings for a workflow run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Workflow file path, used to name the state file
    pub workflow_path: String,
    pub event: TriggerEvent,
    pub dry_run: bool,
    /// Ignore any saved state
    pub fresh: bool,
    /// Source tree that checkout copies from
    pub working_dir: PathBuf,
    /// Defaults to `<working dir>/.poempress`
    pub run_dir: Option<PathBuf>,
    /// Defaults to `<run dir>/site`
    pub hosting_root: Option<PathBuf>,
    pub base_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflow_path: "workflow.yml".to_string(),
            event: TriggerEvent::ManualDispatch,
            dry_run: false,
            fresh: false,
            working_dir: PathBuf::from("."),
            run_dir: None,
            hosting_root: None,
            base_url: None,
        }
    }
}

impl EngineConfig {
    pub fn run_dir(&self) -> PathBuf {
        self.run_dir
            .clone()
            .unwrap_or_else(|| self.working_dir.join(DEFAULT_RUN_DIR))
    }

    pub fn hosting_root(&self) -> PathBuf {
        self.hosting_root
            .clone()
            .unwrap_or_else(|| self.run_dir().join("site"))
    }
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The event does not match the workflow's triggers
    NotTriggered,
    /// The plan was printed, nothing executed
    DryRun,
    Succeeded,
}

/// Deployment environment reported by a job.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentReport {
    pub name: String,
    pub url: Option<String>,
}

/// What happened to one job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub job_id: String,
    pub status: JobStatus,
    pub steps: usize,
    pub artifacts: Vec<String>,
    pub environment: Option<EnvironmentReport>,
}

/// Summary of a workflow run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub jobs: Vec<JobReport>,
    pub duration: Duration,
}

impl RunReport {
    fn new(outcome: RunOutcome, start: Instant) -> Self {
        Self {
            outcome,
            jobs: Vec::new(),
            duration: start.elapsed(),
        }
    }

    /// URL of the last environment that reported one.
    pub fn page_url(&self) -> Option<&str> {
        self.jobs
            .iter()
            .rev()
            .filter_map(|job| job.environment.as_ref())
            .find_map(|env| env.url.as_deref().filter(|url| !url.is_empty()))
    }
}

/// Workflow execution engine.
///
/// # Example
///
/// ```rust,no_run
/// use poempress::execution::Engine;
/// use poempress::workflow::{load_workflow, TriggerEvent};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let path = ".github/workflows/pages.yml";
///     let mut engine = Engine::new(load_workflow(path)?);
///     engine.set_workflow_path(path);
///     engine.set_event(TriggerEvent::push("main"));
///
///     let report = engine.run()?;
///     println!("Published to {:?}", report.page_url());
///     Ok(())
/// }
/// ```
pub struct Engine {
    workflow: Workflow,
    config: EngineConfig,
}

impl Engine {
    pub fn new(workflow: Workflow) -> Self {
        Self::with_config(workflow, EngineConfig::default())
    }

    pub fn with_config(workflow: Workflow, config: EngineConfig) -> Self {
        Self { workflow, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Sets the workflow file path (used for state persistence).
    pub fn set_workflow_path(&mut self, path: impl Into<String>) {
        self.config.workflow_path = path.into();
    }

    pub fn set_event(&mut self, event: TriggerEvent) {
        self.config.event = event;
    }

    /// Enables or disables dry run mode.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.config.dry_run = dry_run;
    }

    pub fn set_fresh(&mut self, fresh: bool) {
        self.config.fresh = fresh;
    }

    /// Sets the source tree checked out into each workspace.
    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.config.working_dir = dir.into();
    }

    pub fn set_run_dir(&mut self, dir: impl Into<PathBuf>) {
        self.config.run_dir = Some(dir.into());
    }

    pub fn set_hosting_root(&mut self, dir: impl Into<PathBuf>) {
        self.config.hosting_root = Some(dir.into());
    }

    pub fn set_base_url(&mut self, url: impl Into<String>) {
        self.config.base_url = Some(url.into());
    }

    /// Executes the workflow.
    ///
    /// This is the main entry point that:
    /// 1. Checks the event against the workflow's triggers
    /// 2. Loads or creates run state
    /// 3. Skips completed jobs whose artifacts still exist
    /// 4. Runs the remaining jobs one at a time, each on a fresh workspace
    /// 5. Saves state after each job
    /// 6. Reports the final results
    pub fn run(&mut self) -> Result<RunReport, EngineError> {
        let start_time = Instant::now();
        let event = self.config.event.clone();

        if !self.workflow.triggers.matches(&event) {
            info!(
                "Workflow does not run on {} (declared: {})",
                event,
                self.workflow.triggers.event_names().join(", ")
            );
            return Ok(RunReport::new(RunOutcome::NotTriggered, start_time));
        }

        info!("Triggered by {}", event);

        if self.config.dry_run {
            self.print_plan();
            return Ok(RunReport::new(RunOutcome::DryRun, start_time));
        }

        let run_dir = absolute(&self.config.run_dir())?;
        let services = self.services(&run_dir)?;
        let mut state = self.load_state(&run_dir, &services.artifacts)?;

        let mut timeline = ExecutionTimeline::new();
        let mut planner = if state.is_resume() {
            let resumable = state.completed_jobs.iter().cloned().collect();
            ExecutionPlanner::from_state(self.workflow.clone(), &state, &resumable)
        } else {
            ExecutionPlanner::new(self.workflow.clone())
        };

        let mut reports = Vec::new();
        for job in &self.workflow.jobs {
            if planner.status(&job.id) == Some(&JobStatus::Skipped) {
                timeline.job_event(&job.id, EventType::Skipped);
                reports.push(JobReport {
                    job_id: job.id.clone(),
                    status: JobStatus::Skipped,
                    steps: 0,
                    artifacts: state.artifacts_of(&job.id).to_vec(),
                    environment: None,
                });
            }
        }

        info!(
            "Starting execution ({} jobs, run directory: {})",
            self.workflow.len(),
            run_dir.display()
        );

        // Jobs run one at a time, in workflow order
        while let Some(job) = planner.get_ready_jobs().into_iter().next() {
            info!("Starting job: {}", job.display_name());
            timeline.job_event(&job.id, EventType::Started);
            planner.mark_job_running(&job.id);

            match self.run_job(&job, &event, &run_dir, &services, &mut timeline) {
                Ok(report) => {
                    info!("Job '{}' completed successfully", job.id);
                    timeline.job_event(&job.id, EventType::Completed);
                    planner.mark_job_completed(&job.id);
                    state.mark_completed(&job.id, report.artifacts.clone());
                    state.save(&run_dir)?;
                    reports.push(report);
                }
                Err(e) => {
                    error!("Job '{}' failed: {}", job.id, e);
                    timeline.job_event(&job.id, EventType::Failed);
                    planner.mark_job_failed(&job.id, e.to_string());
                    state.mark_failed(&job.id);
                    state.save(&run_dir)?;
                    println!("{}", timeline.chart());
                    return Err(e);
                }
            }
        }

        if planner.has_work_remaining() {
            return Err(EngineError::Planning(
                "Some jobs could not be scheduled".to_string(),
            ));
        }

        state.delete(&run_dir)?;

        let total_time = start_time.elapsed();
        println!();
        println!("Workflow completed successfully");
        println!("Total execution time: {:.2?}", total_time);
        println!("{}", timeline.chart());

        Ok(RunReport {
            outcome: RunOutcome::Succeeded,
            jobs: reports,
            duration: total_time,
        })
    }

    fn services(&self, run_dir: &Path) -> Result<ActionServices, EngineError> {
        let mut hosting = HostingTarget::new(absolute(&self.config.hosting_root())?);
        if let Some(url) = &self.config.base_url {
            hosting = hosting
                .with_base_url(url)
                .map_err(|e| EngineError::Config(e.to_string()))?;
        }

        Ok(ActionServices {
            source_dir: self.config.working_dir.clone(),
            run_dir: run_dir.to_path_buf(),
            artifacts: ArtifactStore::new(run_dir.join("artifacts")),
            hosting,
        })
    }

    /// Loads saved state, dropping completed jobs whose artifacts are gone.
    fn load_state(&self, run_dir: &Path, artifacts: &ArtifactStore) -> Result<RunState, EngineError> {
        let workflow_path = &self.config.workflow_path;

        let saved = if self.config.fresh {
            if let Some(old) = RunState::load(run_dir, workflow_path).ok().flatten() {
                old.delete(run_dir)?;
            }
            None
        } else {
            RunState::load(run_dir, workflow_path)?
        };

        let Some(mut state) = saved else {
            info!("Starting fresh workflow execution");
            return Ok(RunState::new(workflow_path.as_str()));
        };

        let stale: Vec<String> = state
            .completed_jobs
            .iter()
            .filter(|job_id| {
                self.workflow.get_job(job_id).is_none()
                    || state
                        .artifacts_of(job_id)
                        .iter()
                        .any(|name| !artifacts.exists(name))
            })
            .cloned()
            .collect();

        for job_id in stale {
            info!("Job '{}' artifacts missing - scheduling rerun", job_id);
            state.completed_jobs.remove(&job_id);
            state.artifacts.remove(&job_id);
        }

        Ok(state)
    }

    fn run_job(
        &self,
        job: &Job,
        event: &TriggerEvent,
        run_dir: &Path,
        services: &ActionServices,
        timeline: &mut ExecutionTimeline,
    ) -> Result<JobReport, EngineError> {
        let workspace = fresh_dir(&run_dir.join("workspaces").join(&job.id))?;
        let scratch = fresh_dir(&run_dir.join("scratch").join(&job.id))?;

        if let Some(label) = &job.runs_on {
            info!("Job '{}' runs on '{}' (local workspace {})", job.id, label, workspace.display());
        }

        let mut ctx = JobContext::new(&job.id, &workspace, event);
        ctx.extend_env(&job.env);

        let mut artifacts = Vec::new();
        for step in &job.steps {
            let step_name = step.display_name();
            let kind = resolve_action(step).map_err(|e| EngineError::Planning(e.to_string()))?;

            info!("  Step: {} ({})", step_name, kind.label());
            timeline.step_event(&job.id, &step_name, EventType::Started);

            let env = ctx.step_env(step);
            let request = StepRequest {
                step,
                kind: &kind,
                inputs: ctx.evaluate_inputs(&step.with, &env),
                script: step.run.as_deref().map(|run| ctx.evaluate(run, &env)),
                env,
                workspace: &workspace,
                scratch_dir: &scratch,
            };

            match execute_action(&request, services) {
                Ok(outcome) => {
                    timeline.step_event(&job.id, &step_name, EventType::Completed);
                    if let Some(id) = &step.id {
                        ctx.record_outputs(id, outcome.outputs);
                    }
                    artifacts.extend(outcome.artifact);
                }
                Err(source) => {
                    timeline.step_event(&job.id, &step_name, EventType::Failed);
                    return Err(EngineError::StepFailed {
                        job: job.id.clone(),
                        step: step_name,
                        source,
                    });
                }
            }
        }

        let environment = job.environment.as_ref().map(|env| {
            let url = env
                .url
                .as_deref()
                .map(|url| ctx.evaluate(url, ctx.env()))
                .filter(|url| !url.is_empty());
            match &url {
                Some(url) => info!("Environment '{}': {}", env.name, url),
                None => warn!("Environment '{}' reported no URL", env.name),
            }
            EnvironmentReport {
                name: env.name.clone(),
                url,
            }
        });

        Ok(JobReport {
            job_id: job.id.clone(),
            status: JobStatus::Completed,
            steps: job.steps.len(),
            artifacts,
            environment,
        })
    }

    /// Prints the plan without executing anything.
    fn print_plan(&self) {
        for job in &self.workflow.jobs {
            println!();
            println!("[DRY RUN] Job: {}", job.display_name());
            if !job.needs.is_empty() {
                println!("  Needs: {}", job.needs.join(", "));
            }
            if let Some(env) = &job.environment {
                println!("  Environment: {}", env.name);
            }
            for step in &job.steps {
                let action = resolve_action(step)
                    .map(|kind| kind.label())
                    .unwrap_or_else(|e| e.to_string());
                println!("  Step: {} [{}]", step.display_name(), action);
                for (key, value) in &step.with {
                    println!("    {}: {}", key, value);
                }
            }
        }
        println!();
    }
}

/// Scripts run inside job workspaces, so every run path must be absolute.
fn absolute(path: &Path) -> Result<PathBuf, EngineError> {
    std::path::absolute(path).map_err(|source| EngineError::Workspace {
        path: path.to_path_buf(),
        source,
    })
}

/// Removes and recreates `dir`.
fn fresh_dir(dir: &Path) -> Result<PathBuf, EngineError> {
    let to_error = |source| EngineError::Workspace {
        path: dir.to_path_buf(),
        source,
    };

    if dir.exists() {
        fs::remove_dir_all(dir).map_err(to_error)?;
    }
    fs::create_dir_all(dir).map_err(to_error)?;
    Ok(dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;
    use crate::workflow::parse_workflow;
    use tempfile::{tempdir, TempDir};

    const PAGES_WORKFLOW: &str = r#"
name: Publish poems
on:
  push:
    branches: [main]
  workflow_dispatch:
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - id: pages
        uses: actions/configure-pages@v5
      - uses: poempress/generate
        with:
          input: poems.txt
          title: Test Poems
      - uses: poempress/stage
        with:
          dest: _site
      - uses: actions/upload-pages-artifact@v3
  deploy:
    needs: build
    environment:
      name: github-pages
      url: ${{ steps.deployment.outputs.page_url }}
    steps:
      - id: deployment
        uses: actions/deploy-pages@v4
"#;

    fn repo() -> TempDir {
        let dir = tempdir().unwrap();
        let repo = dir.path();
        fs::create_dir_all(repo.join("images")).unwrap();
        fs::write(repo.join("images/sun.jpg"), "jpg").unwrap();
        fs::write(repo.join("style.css"), "body {}").unwrap();
        fs::write(
            repo.join("poems.txt"),
            "top: sun.jpg\nfirst poem\n===\nsecond poem\n===\nthird\n",
        )
        .unwrap();
        dir
    }

    fn engine(dir: &TempDir, yaml: &str) -> Engine {
        let mut engine = Engine::new(parse_workflow(yaml).unwrap());
        engine.set_workflow_path("pages.yml");
        engine.set_working_dir(dir.path());
        engine
    }

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.event, TriggerEvent::ManualDispatch);
        assert_eq!(config.run_dir(), PathBuf::from("./.poempress"));
        assert_eq!(config.hosting_root(), PathBuf::from("./.poempress/site"));
    }

    #[test]
    fn test_engine_setters() {
        let mut engine = Engine::new(Workflow::new());
        engine.set_workflow_path("pages.yml");
        engine.set_dry_run(true);
        engine.set_fresh(true);
        engine.set_run_dir("/tmp/run");
        engine.set_hosting_root("/srv/www");
        engine.set_base_url("https://poems.example.org/");

        let config = engine.config();
        assert_eq!(config.workflow_path, "pages.yml");
        assert!(config.dry_run && config.fresh);
        assert_eq!(config.run_dir(), PathBuf::from("/tmp/run"));
        assert_eq!(config.hosting_root(), PathBuf::from("/srv/www"));
    }

    #[test]
    fn test_not_triggered() {
        let dir = repo();
        let mut engine = engine(&dir, PAGES_WORKFLOW);
        engine.set_event(TriggerEvent::push("feature/x"));

        let report = engine.run().unwrap();
        assert_eq!(report.outcome, RunOutcome::NotTriggered);
        assert!(!dir.path().join(DEFAULT_RUN_DIR).exists());
    }

    #[test]
    fn test_dry_run_executes_nothing() {
        let dir = repo();
        let mut engine = engine(&dir, PAGES_WORKFLOW);
        engine.set_dry_run(true);

        let report = engine.run().unwrap();
        assert_eq!(report.outcome, RunOutcome::DryRun);
        assert!(report.jobs.is_empty());
        assert!(!dir.path().join(DEFAULT_RUN_DIR).exists());
    }

    #[test]
    fn test_repository_workflow_plans() {
        let root = env!("CARGO_MANIFEST_DIR");
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/.github/workflows/pages.yml");
        let workflow = crate::workflow::load_workflow(path).unwrap();

        for step in workflow.jobs.iter().flat_map(|job| &job.steps) {
            if let Some(uses) = &step.uses {
                let action = crate::workflow::ActionRef::parse(uses).unwrap();
                assert!(!action.is_local(), "{} only exists in this runner", uses);
                assert!(action.version.is_some(), "{} is not pinned", uses);
            }
            assert!(crate::workflow::resolve_action(step).is_ok());
        }

        let mut engine = Engine::new(workflow);
        engine.set_working_dir(root);
        engine.set_dry_run(true);
        let report = engine.run().unwrap();
        assert_eq!(report.outcome, RunOutcome::DryRun);
    }

    #[test]
    fn test_build_and_deploy() {
        let dir = repo();
        let mut engine = engine(&dir, PAGES_WORKFLOW);
        engine.set_event(TriggerEvent::push("main"));
        engine.set_base_url("https://poems.example.org/");

        let report = engine.run().unwrap();
        assert_eq!(report.outcome, RunOutcome::Succeeded);
        assert_eq!(report.jobs.len(), 2);
        assert_eq!(report.jobs[0].artifacts, vec!["github-pages"]);
        assert_eq!(report.page_url(), Some("https://poems.example.org/"));

        let site = dir.path().join(".poempress/site");
        assert!(site.join("index.html").exists());
        assert!(site.join("style.css").exists());
        assert!(site.join("images/sun.jpg").exists());
        assert!(!site.join("poems.txt").exists());

        let index = fs::read_to_string(site.join("index.html")).unwrap();
        assert!(index.contains("<title>Test Poems</title>"));

        // The deploy job starts from an empty workspace
        let deploy_ws = dir.path().join(".poempress/workspaces/deploy");
        assert!(fs::read_dir(deploy_ws).unwrap().next().is_none());

        // Successful runs leave no state behind
        assert!(!dir.path().join(".poempress/pages.state").exists());
    }

    #[test]
    fn test_failure_then_resume() {
        let dir = repo();
        let marker = dir.path().join("deploy-allowed");
        let yaml = format!(
            r#"
on: workflow_dispatch
jobs:
  build:
    steps:
      - uses: actions/checkout@v4
      - uses: poempress/generate
      - uses: poempress/stage
        with:
          dest: _site
      - uses: actions/upload-pages-artifact@v3
  deploy:
    needs: build
    env:
      MARKER: {}
    steps:
      - run: test -f "$MARKER"
      - uses: actions/deploy-pages@v4
"#,
            marker.display()
        );

        let mut first = engine(&dir, &yaml);
        let err = first.run().unwrap_err();
        assert!(matches!(
            err,
            EngineError::StepFailed {
                source: ActionError::CommandFailed { .. },
                ..
            }
        ));

        let state = RunState::load(&dir.path().join(DEFAULT_RUN_DIR), "pages.yml")
            .unwrap()
            .unwrap();
        assert!(state.completed_jobs.contains("build"));
        assert_eq!(state.failed_job.as_deref(), Some("deploy"));

        fs::write(&marker, "").unwrap();
        let mut second = engine(&dir, &yaml);
        let report = second.run().unwrap();

        assert_eq!(report.jobs[0].job_id, "build");
        assert_eq!(report.jobs[0].status, JobStatus::Skipped);
        assert_eq!(report.jobs[1].status, JobStatus::Completed);
        assert!(dir.path().join(".poempress/site/index.html").exists());
    }

    #[test]
    fn test_resume_reruns_job_with_missing_artifact() {
        let dir = repo();
        let run_dir = dir.path().join(DEFAULT_RUN_DIR);
        let mut state = RunState::new("pages.yml");
        state.mark_completed("build", vec!["github-pages".to_string()]);
        state.save(&run_dir).unwrap();

        let mut engine = engine(&dir, PAGES_WORKFLOW);
        let report = engine.run().unwrap();

        assert_eq!(report.jobs[0].job_id, "build");
        assert_eq!(report.jobs[0].status, JobStatus::Completed);
    }

    #[test]
    fn test_fresh_ignores_saved_state() {
        let dir = repo();
        let run_dir = dir.path().join(DEFAULT_RUN_DIR);
        let store = ArtifactStore::new(run_dir.join("artifacts"));
        let site = dir.path().join("prebuilt");
        fs::create_dir_all(&site).unwrap();
        fs::write(site.join("index.html"), "old").unwrap();
        store.upload("github-pages", &site).unwrap();

        let mut state = RunState::new("pages.yml");
        state.mark_completed("build", vec!["github-pages".to_string()]);
        state.save(&run_dir).unwrap();

        let mut engine = engine(&dir, PAGES_WORKFLOW);
        engine.set_fresh(true);
        let report = engine.run().unwrap();

        assert_eq!(report.jobs[0].status, JobStatus::Completed);
        let index = fs::read_to_string(run_dir.join("site/index.html")).unwrap();
        assert!(index.contains("<!DOCTYPE html>"));
    }

    #[test]
    fn test_step_outputs_flow_between_steps() {
        let dir = repo();
        let out = dir.path().join("greeting.txt");
        let yaml = format!(
            r#"
on: workflow_dispatch
jobs:
  build:
    env:
      WHO: poet
    steps:
      - id: hello
        run: echo "text=hello $WHO" >> "$GITHUB_OUTPUT"
      - run: echo "${{{{ steps.hello.outputs.text }}}} via ${{{{ github.event_name }}}}" > "{}"
"#,
            out.display()
        );

        let mut engine = engine(&dir, &yaml);
        engine.run().unwrap();

        assert_eq!(
            fs::read_to_string(&out).unwrap().trim(),
            "hello poet via workflow_dispatch"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let dir = repo();
        let mut engine = engine(&dir, PAGES_WORKFLOW);
        engine.set_base_url("not a url");
        assert!(matches!(engine.run(), Err(EngineError::Config(_))));
    }
}
