//! Action Resolution
//!
//! Maps a step's `uses:` reference (or `run:` script) onto one of the
//! built-in actions the engine knows how to execute.

use std::fmt;

use thiserror::Error;

use super::model::Step;
use crate::runtime::Runtime;

/// Owner used for actions implemented by this crate. These only exist in
/// the local runner and need no `@ref`; every other action must be pinned.
pub const LOCAL_OWNER: &str = "poempress";

/// A parsed `owner/name[/path][@version]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef {
    pub owner: String,
    pub name: String,
    pub version: Option<String>,
}

impl ActionRef {
    pub fn is_local(&self) -> bool {
        self.owner == LOCAL_OWNER
    }

    pub fn parse(reference: &str) -> Option<Self> {
        let (path, version) = match reference.trim().split_once('@') {
            Some((path, version)) => (path, Some(version.trim().to_string())),
            None => (reference.trim(), None),
        };

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let owner = segments.next()?.to_string();
        let name = segments.next()?.to_string();

        Some(Self {
            owner,
            name,
            version: version.filter(|v| !v.is_empty()),
        })
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)?;
        if let Some(version) = &self.version {
            write!(f, "@{}", version)?;
        }
        Ok(())
    }
}

/// The built-in behaviour a step maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Checkout,
    SetupRuntime(Runtime),
    ConfigurePages,
    /// `pages` artifacts default to the `github-pages` name and `_site` path
    UploadArtifact { pages: bool },
    DownloadArtifact,
    DeployPages,
    Generate,
    Stage,
    Shell,
}

impl ActionKind {
    pub fn label(&self) -> String {
        match self {
            Self::Checkout => "checkout".to_string(),
            Self::SetupRuntime(runtime) => format!("setup-{}", runtime),
            Self::ConfigurePages => "configure-pages".to_string(),
            Self::UploadArtifact { pages: true } => "upload-pages-artifact".to_string(),
            Self::UploadArtifact { pages: false } => "upload-artifact".to_string(),
            Self::DownloadArtifact => "download-artifact".to_string(),
            Self::DeployPages => "deploy-pages".to_string(),
            Self::Generate => "generate".to_string(),
            Self::Stage => "stage".to_string(),
            Self::Shell => "shell".to_string(),
        }
    }
}

/// Why a step could not be mapped to an action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("step has both 'uses' and 'run'")]
    Ambiguous,

    #[error("step needs either 'uses' or 'run'")]
    Empty,

    #[error("unsupported action '{0}'")]
    Unsupported(String),

    #[error("action '{0}' must be pinned with '@<ref>'")]
    MissingRef(String),
}

/// Resolves the action a step runs.
///
/// # Example
///
/// ```
/// use poempress::workflow::{resolve_action, ActionKind, Step};
///
/// let kind = resolve_action(&Step::action("actions/checkout@v4")).unwrap();
/// assert_eq!(kind, ActionKind::Checkout);
/// ```
pub fn resolve_action(step: &Step) -> Result<ActionKind, ResolveError> {
    let uses = match (&step.uses, &step.run) {
        (Some(_), Some(_)) => return Err(ResolveError::Ambiguous),
        (None, None) => return Err(ResolveError::Empty),
        (None, Some(_)) => return Ok(ActionKind::Shell),
        (Some(uses), None) => uses,
    };

    let action = ActionRef::parse(uses).ok_or_else(|| ResolveError::Unsupported(uses.clone()))?;
    if action.version.is_none() && !action.is_local() {
        return Err(ResolveError::MissingRef(uses.clone()));
    }

    if let Some(runtime) = Runtime::from_action_name(&action.name) {
        return Ok(ActionKind::SetupRuntime(runtime));
    }

    let kind = match (action.owner.as_str(), action.name.as_str()) {
        ("actions", "checkout") => ActionKind::Checkout,
        ("actions", "configure-pages") => ActionKind::ConfigurePages,
        ("actions", "upload-pages-artifact") => ActionKind::UploadArtifact { pages: true },
        ("actions", "upload-artifact") => ActionKind::UploadArtifact { pages: false },
        ("actions", "download-artifact") => ActionKind::DownloadArtifact,
        ("actions", "deploy-pages") => ActionKind::DeployPages,
        (LOCAL_OWNER, "generate") => ActionKind::Generate,
        (LOCAL_OWNER, "stage") => ActionKind::Stage,
        _ => return Err(ResolveError::Unsupported(uses.clone())),
    };

    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_ref_parse() {
        let action = ActionRef::parse("actions/checkout@v4").unwrap();
        assert_eq!(action.owner, "actions");
        assert_eq!(action.name, "checkout");
        assert_eq!(action.version.as_deref(), Some("v4"));
        assert_eq!(action.to_string(), "actions/checkout@v4");

        let local = ActionRef::parse("poempress/generate").unwrap();
        assert_eq!(local.version, None);

        let nested = ActionRef::parse("owner/repo/sub/path@main").unwrap();
        assert_eq!(nested.name, "repo");

        assert!(ActionRef::parse("checkout").is_none());
        assert!(ActionRef::parse("@v1").is_none());
    }

    #[test]
    fn test_resolve_known_actions() {
        let cases = [
            ("actions/checkout@v4", ActionKind::Checkout),
            ("actions/setup-python@v5", ActionKind::SetupRuntime(Runtime::Python)),
            ("actions/setup-node@v4", ActionKind::SetupRuntime(Runtime::Node)),
            ("dtolnay/rust-toolchain@stable", ActionKind::SetupRuntime(Runtime::Rust)),
            ("actions/configure-pages@v5", ActionKind::ConfigurePages),
            (
                "actions/upload-pages-artifact@v3",
                ActionKind::UploadArtifact { pages: true },
            ),
            (
                "actions/upload-artifact@v4",
                ActionKind::UploadArtifact { pages: false },
            ),
            ("actions/download-artifact@v4", ActionKind::DownloadArtifact),
            ("actions/deploy-pages@v4", ActionKind::DeployPages),
            ("poempress/generate", ActionKind::Generate),
            ("poempress/stage", ActionKind::Stage),
        ];

        for (uses, expected) in cases {
            assert_eq!(resolve_action(&Step::action(uses)).unwrap(), expected, "{}", uses);
        }
    }

    #[test]
    fn test_resolve_shell() {
        assert_eq!(
            resolve_action(&Step::script("echo hi")).unwrap(),
            ActionKind::Shell
        );
    }

    #[test]
    fn test_resolve_errors() {
        let mut both = Step::action("actions/checkout@v4");
        both.run = Some("echo".to_string());
        assert_eq!(resolve_action(&both), Err(ResolveError::Ambiguous));

        assert_eq!(resolve_action(&Step::default()), Err(ResolveError::Empty));

        assert_eq!(
            resolve_action(&Step::action("someone/unknown@v1")),
            Err(ResolveError::Unsupported("someone/unknown@v1".to_string()))
        );
    }

    #[test]
    fn test_remote_actions_need_ref() {
        assert_eq!(
            resolve_action(&Step::action("actions/checkout")),
            Err(ResolveError::MissingRef("actions/checkout".to_string()))
        );
        assert_eq!(
            resolve_action(&Step::action("dtolnay/rust-toolchain")),
            Err(ResolveError::MissingRef("dtolnay/rust-toolchain".to_string()))
        );
        assert_eq!(
            resolve_action(&Step::action("poempress/generate")),
            Ok(ActionKind::Generate)
        );
    }

    #[test]
    fn test_action_kind_labels() {
        assert_eq!(ActionKind::SetupRuntime(Runtime::Python).label(), "setup-python");
        assert_eq!(ActionKind::UploadArtifact { pages: true }.label(), "upload-pages-artifact");
        assert_eq!(ActionKind::Shell.label(), "shell");
    }
}
