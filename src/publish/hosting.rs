//! Static Hosting Target
//!
//! A hosting root is a directory served as-is. Publishing copies the new
//! site next to the root and swaps it in with renames, so the root always
//! holds either the previous site or the new one.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use url::Url;

use super::copy_tree;
use crate::error::{ActionError, ActionResult};

/// Result of publishing a site.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReport {
    pub root: PathBuf,
    pub files: usize,
    pub page_url: String,
}

/// Where published sites land and the URL they are served under.
#[derive(Debug, Clone)]
pub struct HostingTarget {
    root: PathBuf,
    base_url: Option<Url>,
}

impl HostingTarget {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
        }
    }

    /// Sets the public URL of the hosting root.
    pub fn with_base_url(mut self, base_url: &str) -> ActionResult<Self> {
        let url = Url::parse(base_url)
            .map_err(|e| ActionError::InvalidInput(format!("base url '{}': {}", base_url, e)))?;
        self.base_url = Some(url);
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn absolute_root(&self) -> PathBuf {
        if self.root.is_absolute() {
            self.root.clone()
        } else {
            env::current_dir()
                .map(|cwd| cwd.join(&self.root))
                .unwrap_or_else(|_| self.root.clone())
        }
    }

    /// URL of the site's landing page.
    ///
    /// Without a configured base URL this is the `file://` URL of the root.
    pub fn page_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.to_string(),
            None => Url::from_directory_path(self.absolute_root())
                .map(|url| url.to_string())
                .unwrap_or_else(|_| self.root.display().to_string()),
        }
    }

    /// Path component of the base URL, `/` when unset.
    pub fn base_path(&self) -> String {
        self.base_url
            .as_ref()
            .map(|url| url.path().to_string())
            .unwrap_or_else(|| "/".to_string())
    }

    /// Replaces the hosted site with the contents of `source`.
    pub fn publish(&self, source: &Path) -> ActionResult<PublishReport> {
        if !source.is_dir() {
            return Err(ActionError::MissingDirectory(source.to_path_buf()));
        }

        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ActionError::InvalidInput(format!(
                    "hosting root '{}' has no directory name",
                    self.root.display()
                ))
            })?;

        let parent = match self.root.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| ActionError::io(&parent, e))?;

        let staging = parent.join(format!(".{}.staging", name));
        let previous = parent.join(format!(".{}.previous", name));
        for leftover in [&staging, &previous] {
            if leftover.exists() {
                fs::remove_dir_all(leftover).map_err(|e| ActionError::io(leftover, e))?;
            }
        }

        let files = copy_tree(source, &staging, &|_| false).map_err(|e| ActionError::io(&staging, e))?;
        debug!("Prepared {} files in {}", files, staging.display());

        let had_previous = self.root.exists();
        if had_previous {
            fs::rename(&self.root, &previous).map_err(|e| ActionError::io(&self.root, e))?;
        }

        if let Err(e) = fs::rename(&staging, &self.root) {
            if had_previous {
                if let Err(restore) = fs::rename(&previous, &self.root) {
                    warn!("Failed to restore previous site: {}", restore);
                }
            }
            return Err(ActionError::io(&self.root, e));
        }

        if had_previous {
            if let Err(e) = fs::remove_dir_all(&previous) {
                warn!("Failed to remove previous site {}: {}", previous.display(), e);
            }
        }

        let page_url = self.page_url();
        info!("Published {} files to {} ({})", files, self.root.display(), page_url);

        Ok(PublishReport {
            root: self.root.clone(),
            files,
            page_url,
        })
    }
}
