//! poempress CLI Entry Point
//!
//! # Usage
//!
//! ```bash
//! # Render poems.txt into the current directory
//! poempress generate poems.txt
//!
//! # Run the publishing workflow as a push to main would
//! poempress run --event push --branch main
//!
//! # Preview the plan without executing
//! poempress run .github/workflows/pages.yml --dry-run
//!
//! # Check a workflow file
//! poempress validate
//!
//! # Collect the publishable files into _site/, leaving out src/
//! poempress stage . _site --exclude src
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::info;

use poempress::execution::{Engine, RunOutcome, RunReport};
use poempress::publish::{stage_site, StageOptions};
use poempress::site::generator::{DEFAULT_POEMS_PER_PAGE, DEFAULT_TITLE};
use poempress::site::{SiteConfig, SiteGenerator};
use poempress::workflow::{load_workflow, resolve_action, JobStatus, TriggerEvent};
use poempress::{APP_NAME, VERSION};

/// Workflow file used when none is specified.
const DEFAULT_WORKFLOW: &str = ".github/workflows/pages.yml";

#[derive(Parser)]
#[command(name = "poempress", version, about = "Static poem site generator and publishing runner")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a poem source file into paginated HTML
    Generate {
        /// Poem source file
        input: PathBuf,

        /// Directory the pages are written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Poems on each page
        #[arg(long, default_value_t = DEFAULT_POEMS_PER_PAGE)]
        per_page: usize,

        /// Site title
        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,
    },

    /// Run a workflow locally
    Run {
        /// Workflow YAML file
        #[arg(default_value = DEFAULT_WORKFLOW)]
        workflow: PathBuf,

        /// Event that starts the run
        #[arg(long, value_enum, default_value_t = EventArg::Dispatch)]
        event: EventArg,

        /// Branch pushed to (push events)
        #[arg(long, default_value = "main")]
        branch: String,

        /// Print the plan without executing anything
        #[arg(long)]
        dry_run: bool,

        /// Ignore state saved by an earlier run
        #[arg(long)]
        fresh: bool,

        /// Source tree to run against
        #[arg(long)]
        working_dir: Option<PathBuf>,

        /// Directory for workspaces, artifacts and state
        #[arg(long)]
        run_dir: Option<PathBuf>,

        /// Directory the deployed site is published into
        #[arg(long, env = "POEMPRESS_HOSTING_ROOT")]
        hosting_root: Option<PathBuf>,

        /// Public URL of the hosting root
        #[arg(long, env = "POEMPRESS_BASE_URL")]
        base_url: Option<String>,
    },

    /// Validate a workflow file and show its jobs
    Validate {
        #[arg(default_value = DEFAULT_WORKFLOW)]
        workflow: PathBuf,
    },

    /// Copy publishable files into a directory
    Stage {
        #[arg(default_value = ".")]
        source: PathBuf,

        #[arg(default_value = "public")]
        dest: PathBuf,

        /// Additional directory or file names to leave out
        #[arg(long)]
        exclude: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EventArg {
    Push,
    Dispatch,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Static poem site generator");
    println!();
}

/// Validates and switches to the working directory.
fn setup_working_directory(working_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(dir) = working_dir else {
        info!("Working directory: {}", env::current_dir()?.display());
        return Ok(());
    };

    if !dir.is_dir() {
        return Err(format!("Working directory does not exist: {}", dir.display()).into());
    }

    env::set_current_dir(dir)?;
    info!("Working directory: {}", env::current_dir()?.display());
    Ok(())
}

fn generate(
    input: &Path,
    output: &Path,
    per_page: usize,
    title: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = SiteConfig {
        title,
        poems_per_page: per_page,
        ..SiteConfig::default()
    };

    let report = SiteGenerator::new(config, output).generate(input)?;

    println!(
        "{} {} poems on {} pages in {}",
        "Generated".green().bold(),
        report.blocks,
        report.pages.len(),
        output.display()
    );
    for page in &report.pruned {
        println!("  {} {}", "removed".yellow(), page.display());
    }
    Ok(())
}

fn validate(workflow_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let workflow = load_workflow(workflow_path)?;

    println!(
        "{} {} ({} jobs, {} steps)",
        "Valid".green().bold(),
        workflow.name.as_deref().unwrap_or("workflow"),
        workflow.len(),
        workflow.step_count()
    );
    println!("  on: {}", workflow.triggers.event_names().join(", "));

    for job in &workflow.jobs {
        println!();
        print!("  {}", job.display_name().bold());
        if !job.needs.is_empty() {
            print!(" (needs {})", job.needs.join(", "));
        }
        println!();
        for step in &job.steps {
            let action = resolve_action(step)
                .map(|kind| kind.label())
                .unwrap_or_else(|e| e.to_string());
            println!("    - {} [{}]", step.display_name(), action.cyan());
        }
    }
    Ok(())
}

fn stage(source: &Path, dest: &Path, exclude: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = StageOptions::default();
    options.exclude.extend(exclude);

    let report = stage_site(source, dest, &options)?;
    println!(
        "{} {} files into {}",
        "Staged".green().bold(),
        report.total_files,
        report.dest.display()
    );
    Ok(())
}

fn print_run_summary(report: &RunReport) {
    match report.outcome {
        RunOutcome::NotTriggered => {
            println!("{}", "Workflow not triggered by this event".yellow());
            return;
        }
        RunOutcome::DryRun => {
            println!("{}", "Dry run complete; nothing executed".cyan());
            return;
        }
        RunOutcome::Succeeded => {}
    }

    for job in &report.jobs {
        let status = match &job.status {
            JobStatus::Completed => "completed".green(),
            JobStatus::Skipped => "skipped (resumed)".yellow(),
            other => format!("{:?}", other).normal(),
        };
        println!("  {} {}", job.job_id.bold(), status);
    }

    if let Some(url) = report.page_url() {
        println!();
        println!("{} {}", "Published:".green().bold(), url);
    }
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    print_banner();

    match cli.command {
        Commands::Generate {
            input,
            output,
            per_page,
            title,
        } => generate(&input, &output, per_page, title),

        Commands::Validate { workflow } => validate(&workflow),

        Commands::Stage {
            source,
            dest,
            exclude,
        } => stage(&source, &dest, exclude),

        Commands::Run {
            workflow,
            event,
            branch,
            dry_run,
            fresh,
            working_dir,
            run_dir,
            hosting_root,
            base_url,
        } => {
            // Resolve paths given relative to the caller before switching directories
            let cwd = env::current_dir()?;
            let absolute = |p: PathBuf| if p.is_absolute() { p } else { cwd.join(p) };
            let run_dir = run_dir.map(absolute);
            let hosting_root = hosting_root.map(absolute);

            setup_working_directory(working_dir.as_deref())?;

            if dry_run {
                info!("Mode: DRY RUN (steps will not execute)");
            }

            let loaded = load_workflow(&workflow).map_err(|e| {
                format!("Could not load workflow from '{}': {}", workflow.display(), e)
            })?;
            info!(
                "Workflow loaded: {} jobs, {} steps",
                loaded.len(),
                loaded.step_count()
            );

            let mut engine = Engine::new(loaded);
            engine.set_workflow_path(workflow.display().to_string());
            engine.set_event(match event {
                EventArg::Push => TriggerEvent::push(branch),
                EventArg::Dispatch => TriggerEvent::ManualDispatch,
            });
            engine.set_dry_run(dry_run);
            engine.set_fresh(fresh);
            if let Some(dir) = run_dir {
                engine.set_run_dir(dir);
            }
            if let Some(dir) = hosting_root {
                engine.set_hosting_root(dir);
            }
            if let Some(url) = base_url {
                engine.set_base_url(url);
            }

            let report = engine.run()?;
            print_run_summary(&report);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
