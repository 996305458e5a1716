//! poempress - Static Poem Site Generator and Publishing Runner
//!
//! Turns a plain-text poem collection into a paginated static website and
//! publishes it through a local build-and-deploy workflow, run from the same
//! YAML a hosted CI service would use.
//!
//! # Architecture
//!
//! - [`site`]: Poem source parsing and HTML rendering
//! - [`workflow`]: Workflow definitions, triggers, validation and run state
//! - [`execution`]: Engine running jobs on fresh workspaces with built-in actions
//! - [`publish`]: Staging, artifact store and static hosting target
//! - [`runtime`]: Toolchain detection for pinned runtimes
//! - [`monitoring`]: Execution timeline
//!
//! # Example
//!
//! ```rust,no_run
//! use poempress::execution::Engine;
//! use poempress::load_workflow;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load the publishing workflow
//!     let workflow = load_workflow(".github/workflows/pages.yml")?;
//!
//!     // Build and deploy on local workspaces
//!     let mut engine = Engine::new(workflow);
//!     engine.set_hosting_root("/srv/poems");
//!
//!     let report = engine.run()?;
//!     println!("Site at {:?}", report.page_url());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod execution;
pub mod monitoring;
pub mod publish;
pub mod runtime;
pub mod site;
pub mod workflow;

// Re-export commonly used types
pub use error::{ActionError, EngineError, SiteError, WorkflowError};
pub use execution::engine::Engine;
pub use site::{SiteConfig, SiteGenerator};
pub use workflow::model::{Job, Step, Workflow};
pub use workflow::parser::load_workflow;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "poempress";
