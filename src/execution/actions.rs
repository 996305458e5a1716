//! Built-in Actions
//!
//! Local implementations of the actions a publishing workflow uses. Each
//! action reads its evaluated `with:` inputs, works inside the job
//! workspace and returns the outputs later steps can reference.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::shell::{run_script, ShellInvocation};
use crate::error::{ActionError, ActionResult};
use crate::publish::{copy_tree, same_path, stage_site, ArtifactStore, HostingTarget, StageOptions};
use crate::runtime::{provision, Runtime};
use crate::site::{SiteConfig, SiteGenerator};
use crate::workflow::{ActionKind, ActionRef, Step};

/// Artifact name used by the pages upload and deploy actions.
pub const PAGES_ARTIFACT: &str = "github-pages";

/// Default directory uploaded by `upload-pages-artifact`.
pub const PAGES_ARTIFACT_PATH: &str = "_site";

/// Names checkout never copies into a workspace.
const CHECKOUT_EXCLUDES: &[&str] = &[".git", "target"];

/// Run-wide services shared by every step.
#[derive(Debug, Clone)]
pub struct ActionServices {
    /// Tree that `checkout` copies from
    pub source_dir: PathBuf,
    /// Directory holding workspaces, artifacts and state
    pub run_dir: PathBuf,
    pub artifacts: ArtifactStore,
    pub hosting: HostingTarget,
}

/// One step ready to execute, with expressions already evaluated.
#[derive(Debug, Clone)]
pub struct StepRequest<'a> {
    pub step: &'a Step,
    pub kind: &'a ActionKind,
    pub inputs: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    /// `run:` script after evaluation
    pub script: Option<String>,
    pub workspace: &'a Path,
    pub scratch_dir: &'a Path,
}

impl StepRequest<'_> {
    fn input(&self, key: &str) -> Option<&str> {
        self.inputs
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn input_or<'s>(&'s self, key: &str, default: &'s str) -> &'s str {
        self.input(key).unwrap_or(default)
    }

    /// Resolves a path input against the workspace.
    fn workspace_path(&self, value: &str) -> PathBuf {
        let path = Path::new(value);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }
}

/// What a step produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    pub outputs: BTreeMap<String, String>,
    /// Artifact uploaded by this step
    pub artifact: Option<String>,
}

impl StepOutcome {
    fn with_output(mut self, key: &str, value: impl Into<String>) -> Self {
        self.outputs.insert(key.to_string(), value.into());
        self
    }
}

/// Executes one step.
pub fn execute_action(request: &StepRequest<'_>, services: &ActionServices) -> ActionResult<StepOutcome> {
    debug!("Executing {} action", request.kind.label());

    match request.kind {
        ActionKind::Checkout => checkout(request, services),
        ActionKind::SetupRuntime(runtime) => setup_runtime(request, *runtime),
        ActionKind::ConfigurePages => Ok(configure_pages(services)),
        ActionKind::UploadArtifact { pages } => upload_artifact(request, services, *pages),
        ActionKind::DownloadArtifact => download_artifact(request, services),
        ActionKind::DeployPages => deploy_pages(request, services),
        ActionKind::Generate => generate(request),
        ActionKind::Stage => stage(request),
        ActionKind::Shell => shell(request),
    }
}

fn checkout(request: &StepRequest<'_>, services: &ActionServices) -> ActionResult<StepOutcome> {
    let source = &services.source_dir;
    if !source.is_dir() {
        return Err(ActionError::MissingDirectory(source.clone()));
    }

    let dest = request.workspace_path(request.input_or("path", "."));
    let run_dir = &services.run_dir;
    let exclude = |path: &Path| {
        let excluded_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|name| CHECKOUT_EXCLUDES.contains(&name))
            .unwrap_or(false);
        excluded_name || same_path(path, run_dir)
    };

    let files = copy_tree(source, &dest, &exclude).map_err(|e| ActionError::io(source, e))?;
    info!("Checked out {} files from {}", files, source.display());

    Ok(StepOutcome::default().with_output("files", files.to_string()))
}

fn setup_runtime(request: &StepRequest<'_>, runtime: Runtime) -> ActionResult<StepOutcome> {
    // dtolnay/rust-toolchain pins through the action ref, e.g. `@1.79`
    let ref_pin = request
        .step
        .uses
        .as_deref()
        .and_then(ActionRef::parse)
        .and_then(|action| action.version)
        .filter(|_| runtime == Runtime::Rust);

    let pin = request
        .input(runtime.version_input())
        .map(str::to_string)
        .or(ref_pin)
        .unwrap_or_default();

    let toolchain = provision(runtime, &pin)?;
    info!(
        "{} {} satisfies '{}'",
        runtime,
        toolchain.version,
        if pin.is_empty() { "*" } else { pin.as_str() }
    );

    Ok(StepOutcome::default()
        .with_output("version", toolchain.version.to_string())
        .with_output("path", toolchain.path.display().to_string()))
}

fn configure_pages(services: &ActionServices) -> StepOutcome {
    StepOutcome::default()
        .with_output("base_url", services.hosting.page_url())
        .with_output("base_path", services.hosting.base_path())
}

fn upload_artifact(
    request: &StepRequest<'_>,
    services: &ActionServices,
    pages: bool,
) -> ActionResult<StepOutcome> {
    let (name, path) = if pages {
        (
            request.input_or("name", PAGES_ARTIFACT),
            request.input_or("path", PAGES_ARTIFACT_PATH),
        )
    } else {
        (
            request.input_or("name", "artifact"),
            request
                .input("path")
                .ok_or_else(|| ActionError::MissingInput("path".to_string()))?,
        )
    };

    let source = request.workspace_path(path);
    let manifest = services.artifacts.upload(name, &source)?;

    Ok(StepOutcome {
        artifact: Some(name.to_string()),
        ..StepOutcome::default()
    }
    .with_output("artifact-name", name)
    .with_output("files", manifest.files.len().to_string()))
}

fn download_artifact(request: &StepRequest<'_>, services: &ActionServices) -> ActionResult<StepOutcome> {
    let name = request
        .input("name")
        .ok_or_else(|| ActionError::MissingInput("name".to_string()))?;
    let dest = request.workspace_path(request.input_or("path", "."));

    services.artifacts.download(name, &dest)?;

    Ok(StepOutcome::default().with_output("download-path", dest.display().to_string()))
}

fn deploy_pages(request: &StepRequest<'_>, services: &ActionServices) -> ActionResult<StepOutcome> {
    let name = request.input_or("artifact_name", PAGES_ARTIFACT);
    if !services.artifacts.exists(name) {
        return Err(ActionError::ArtifactNotFound(name.to_string()));
    }

    let report = services.hosting.publish(&services.artifacts.files_dir(name))?;
    Ok(StepOutcome::default().with_output("page_url", report.page_url))
}

fn generate(request: &StepRequest<'_>) -> ActionResult<StepOutcome> {
    let mut config = SiteConfig::default();
    if let Some(title) = request.input("title") {
        config.title = title.to_string();
    }
    if let Some(per_page) = request.input("per-page") {
        config.poems_per_page = per_page.parse().map_err(|_| {
            ActionError::InvalidInput(format!("per-page must be a positive number, got '{}'", per_page))
        })?;
    }

    let input = request.workspace_path(request.input_or("input", "poems.txt"));
    let output = request.workspace_path(request.input_or("output", "."));

    let report = SiteGenerator::new(config, &output).generate(&input)?;

    Ok(StepOutcome::default()
        .with_output("pages", report.pages.len().to_string())
        .with_output("poems", report.blocks.to_string()))
}

fn stage(request: &StepRequest<'_>) -> ActionResult<StepOutcome> {
    let source = request.workspace_path(request.input_or("source", "."));
    let dest = request.workspace_path(request.input_or("dest", "public"));

    let report = stage_site(&source, &dest, &StageOptions::default())?;

    Ok(StepOutcome::default()
        .with_output("path", report.dest.display().to_string())
        .with_output("files", report.total_files.to_string()))
}

fn shell(request: &StepRequest<'_>) -> ActionResult<StepOutcome> {
    let script = request
        .script
        .as_deref()
        .ok_or_else(|| ActionError::MissingInput("run".to_string()))?;

    let working_dir = match &request.step.working_directory {
        Some(dir) => request.workspace_path(dir),
        None => request.workspace.to_path_buf(),
    };

    let name = request.step.display_name();
    let outputs = run_script(&ShellInvocation {
        name: &name,
        script,
        workspace: request.workspace,
        working_dir: &working_dir,
        scratch_dir: request.scratch_dir,
        env: &request.env,
    })?;

    Ok(StepOutcome {
        outputs,
        artifact: None,
    })
}
