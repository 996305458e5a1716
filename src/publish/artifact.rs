//! Artifact Store
//!
//! Jobs run in separate workspaces; the store is how a build job hands its
//! output to a deploy job. Each artifact lives at `{root}/{name}/files`
//! next to a `manifest.json` describing its contents.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{copy_tree, list_files};
use crate::error::{ActionError, ActionResult};

const MANIFEST_FILE: &str = "manifest.json";
const FILES_DIR: &str = "files";

/// One file inside an artifact.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArtifactEntry {
    /// Path relative to the artifact root, `/`-separated
    pub path: String,
    pub size: u64,
}

/// Description of an uploaded artifact.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArtifactManifest {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub files: Vec<ArtifactEntry>,
    pub total_bytes: u64,
}

/// Directory-backed store of named artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Directory holding the artifact's files.
    pub fn files_dir(&self, name: &str) -> PathBuf {
        self.artifact_dir(name).join(FILES_DIR)
    }

    /// Returns true if an artifact with this name has been uploaded.
    pub fn exists(&self, name: &str) -> bool {
        self.artifact_dir(name).join(MANIFEST_FILE).is_file()
    }

    /// Packages `source` under `name`, replacing any earlier upload.
    pub fn upload(&self, name: &str, source: &Path) -> ActionResult<ArtifactManifest> {
        validate_name(name)?;
        if !source.is_dir() {
            return Err(ActionError::MissingDirectory(source.to_path_buf()));
        }

        let artifact_dir = self.artifact_dir(name);
        if artifact_dir.exists() {
            fs::remove_dir_all(&artifact_dir).map_err(|e| ActionError::io(&artifact_dir, e))?;
        }

        let files_dir = self.files_dir(name);
        copy_tree(source, &files_dir, &|_| false).map_err(|e| ActionError::io(source, e))?;

        let files: Vec<ArtifactEntry> = list_files(&files_dir)
            .map_err(|e| ActionError::io(&files_dir, e))?
            .into_iter()
            .map(|(path, size)| ArtifactEntry { path, size })
            .collect();

        if files.is_empty() {
            warn!("Artifact '{}' is empty", name);
        }

        let manifest = ArtifactManifest {
            name: name.to_string(),
            created_at: Utc::now(),
            total_bytes: files.iter().map(|f| f.size).sum(),
            files,
        };

        let manifest_path = artifact_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&manifest).map_err(|source| ActionError::Manifest {
            name: name.to_string(),
            source,
        })?;
        fs::write(&manifest_path, json).map_err(|e| ActionError::io(&manifest_path, e))?;

        info!(
            "Uploaded artifact '{}' ({} files, {} bytes)",
            name,
            manifest.files.len(),
            manifest.total_bytes
        );
        Ok(manifest)
    }

    /// Reads the manifest of an uploaded artifact.
    pub fn manifest(&self, name: &str) -> ActionResult<ArtifactManifest> {
        validate_name(name)?;
        let manifest_path = self.artifact_dir(name).join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(ActionError::ArtifactNotFound(name.to_string()));
        }

        let content =
            fs::read_to_string(&manifest_path).map_err(|e| ActionError::io(&manifest_path, e))?;
        serde_json::from_str(&content).map_err(|source| ActionError::Manifest {
            name: name.to_string(),
            source,
        })
    }

    /// Copies an uploaded artifact's files into `dest`.
    pub fn download(&self, name: &str, dest: &Path) -> ActionResult<ArtifactManifest> {
        let manifest = self.manifest(name)?;
        let files_dir = self.files_dir(name);
        copy_tree(&files_dir, dest, &|_| false).map_err(|e| ActionError::io(dest, e))?;

        info!(
            "Downloaded artifact '{}' into {}",
            name,
            dest.display()
        );
        Ok(manifest)
    }
}

/// Artifact names become directory names; keep them to a single component.
fn validate_name(name: &str) -> ActionResult<()> {
    let valid = !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\');

    if valid {
        Ok(())
    } else {
        Err(ActionError::InvalidInput(format!(
            "artifact name '{}' must be a single path component",
            name
        )))
    }
}
