//! Language Toolchain Detection
//!
//! Resolves a runtime binary on `PATH`, asks it for its version and checks
//! that version against the pin declared in the workflow.
//!
//! # Version Pins
//!
//! - `3.11` matches 3.11.x
//! - `3.x` / `3.*` matches any 3.y.z
//! - `>=3.8, <4` and other semver requirements are used as written
//! - `stable`, `latest`, `lts/*` or an empty pin match anything

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::VersionReq;

use crate::error::{ActionError, ActionResult};

pub use semver::Version;

static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("version pattern is valid"));

/// Runtimes a setup step can provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Runtime {
    Python,
    Node,
    Rust,
}

impl Runtime {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Node => "node",
            Self::Rust => "rust",
        }
    }

    /// Binaries to look for, in order of preference.
    pub fn binaries(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &["python3", "python"],
            Self::Node => &["node"],
            Self::Rust => &["rustc"],
        }
    }

    /// The `with:` key carrying the version pin.
    pub fn version_input(&self) -> &'static str {
        match self {
            Self::Python => "python-version",
            Self::Node => "node-version",
            Self::Rust => "toolchain",
        }
    }

    /// Maps a setup action's repository name to its runtime.
    pub fn from_action_name(name: &str) -> Option<Self> {
        match name {
            "setup-python" => Some(Self::Python),
            "setup-node" => Some(Self::Node),
            "rust-toolchain" | "toolchain" => Some(Self::Rust),
            _ => None,
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extracts the first `major.minor[.patch]` from tool output. A missing
/// patch component reads as zero.
pub fn version_from_output(output: &str) -> Option<Version> {
    let caps = VERSION_PATTERN.captures(output)?;
    let component = |index: usize| {
        caps.get(index)
            .map_or(Ok(0), |m| m.as_str().parse::<u64>())
            .ok()
    };
    Some(Version::new(component(1)?, component(2)?, component(3)?))
}

/// A version pin from the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequirement {
    /// Channel names and empty pins
    Any,
    Req(VersionReq),
}

impl VersionRequirement {
    pub fn parse(pin: &str) -> ActionResult<Self> {
        let pin = pin.trim().trim_start_matches('v');
        let lowered = pin.to_ascii_lowercase();

        if pin.is_empty()
            || matches!(lowered.as_str(), "stable" | "latest" | "nightly" | "beta")
            || lowered.starts_with("lts")
        {
            return Ok(Self::Any);
        }

        // A bare `3.11` pins the series, not the caret range semver would read
        let is_bare = pin.starts_with(|c: char| c.is_ascii_digit())
            && !pin.contains(['x', 'X', '*', ',', ' ']);
        let expression = if is_bare {
            format!("={}", pin)
        } else {
            pin.to_string()
        };

        VersionReq::parse(&expression).map(Self::Req).map_err(|e| {
            ActionError::InvalidInput(format!("unsupported version pin '{}': {}", pin, e))
        })
    }

    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::Req(req) => req.matches(version),
        }
    }
}

/// A located toolchain binary.
#[derive(Debug, Clone, PartialEq)]
pub struct Toolchain {
    pub runtime: Runtime,
    pub path: PathBuf,
    pub version: Version,
}

/// Finds a binary on the system PATH.
fn which(binary: &str) -> Option<PathBuf> {
    let output = Command::new("which").arg(binary).output().ok()?;
    if !output.status.success() {
        return None;
    }

    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

/// Runs `binary --version`; some tools report on stderr.
fn query_version(binary: &Path) -> Option<Version> {
    let output = Command::new(binary).arg("--version").output().ok()?;
    let text = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    debug!("{} --version: {}", binary.display(), text.trim());
    version_from_output(&text)
}

/// Locates the first available binary for `runtime` and reads its version.
pub fn locate_toolchain(runtime: Runtime) -> ActionResult<Toolchain> {
    for binary in runtime.binaries() {
        let Some(path) = which(binary) else {
            debug!("{} not found on PATH", binary);
            continue;
        };

        if let Some(version) = query_version(&path) {
            info!("Using {} {} at {}", runtime, version, path.display());
            return Ok(Toolchain {
                runtime,
                path,
                version,
            });
        }
    }

    Err(ActionError::RuntimeNotFound(runtime.name().to_string()))
}

/// Locates `runtime` and checks it against `pin`.
pub fn provision(runtime: Runtime, pin: &str) -> ActionResult<Toolchain> {
    let requirement = VersionRequirement::parse(pin)?;
    let toolchain = locate_toolchain(runtime)?;

    if !requirement.matches(&toolchain.version) {
        return Err(ActionError::RuntimeVersion {
            runtime: runtime.name().to_string(),
            found: toolchain.version.to_string(),
            required: pin.to_string(),
        });
    }

    Ok(toolchain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(s: &str) -> Version {
        version_from_output(s).unwrap()
    }

    #[test]
    fn test_version_from_output() {
        assert_eq!(version("Python 3.11.4"), Version::new(3, 11, 4));
        assert_eq!(version("v20.5.1\n"), Version::new(20, 5, 1));
        assert_eq!(
            version("rustc 1.79.0 (129f3b996 2024-06-10)"),
            Version::new(1, 79, 0)
        );
        assert_eq!(version("tool 2.7"), Version::new(2, 7, 0));
        assert!(version_from_output("no digits here").is_none());
    }

    #[test]
    fn test_version_display() {
        assert_eq!(version("Python 3.12.1").to_string(), "3.12.1");
    }

    #[test]
    fn test_requirement_any() {
        for pin in ["", "stable", "latest", "lts/*", "nightly"] {
            assert_eq!(VersionRequirement::parse(pin).unwrap(), VersionRequirement::Any);
        }
        let star = VersionRequirement::parse("*").unwrap();
        assert!(star.matches(&version("0.1.0")));
    }

    #[test]
    fn test_requirement_series_matching() {
        let req = VersionRequirement::parse("3.x").unwrap();
        assert!(req.matches(&version("3.12.0")));
        assert!(!req.matches(&version("2.7.18")));

        let req = VersionRequirement::parse("3.11").unwrap();
        assert!(req.matches(&version("3.11.9")));
        assert!(!req.matches(&version("3.12.0")));

        let req = VersionRequirement::parse("v20").unwrap();
        assert!(req.matches(&version("20.5.1")));
        assert!(!req.matches(&version("21.0.0")));
    }

    #[test]
    fn test_requirement_exact_patch() {
        let req = VersionRequirement::parse("3.11.2").unwrap();
        assert!(req.matches(&version("3.11.2")));
        assert!(!req.matches(&version("3.11")));
    }

    #[test]
    fn test_requirement_semver_range() {
        let req = VersionRequirement::parse(">=3.8, <4").unwrap();
        assert!(req.matches(&version("3.12.1")));
        assert!(!req.matches(&version("3.7.0")));
        assert!(!req.matches(&version("4.0.0")));
    }

    #[test]
    fn test_requirement_invalid() {
        assert!(VersionRequirement::parse("3.eleven").is_err());
    }

    #[test]
    fn test_runtime_from_action_name() {
        assert_eq!(Runtime::from_action_name("setup-python"), Some(Runtime::Python));
        assert_eq!(Runtime::from_action_name("setup-node"), Some(Runtime::Node));
        assert_eq!(Runtime::from_action_name("rust-toolchain"), Some(Runtime::Rust));
        assert_eq!(Runtime::from_action_name("checkout"), None);
    }

    #[test]
    fn test_runtime_version_inputs() {
        assert_eq!(Runtime::Python.version_input(), "python-version");
        assert_eq!(Runtime::Node.version_input(), "node-version");
        assert_eq!(Runtime::Rust.version_input(), "toolchain");
    }
}
