//! Site Staging
//!
//! Collects the publishable part of a source tree into a single directory:
//! top-level pages and stylesheets plus every subdirectory (media and the
//! like), leaving out version-control and workflow metadata.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::{copy_tree, same_path};
use crate::error::{ActionError, ActionResult};

/// Which files and directories staging picks up.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOptions {
    /// Extensions of top-level files to publish (case-insensitive, no dot)
    pub extensions: Vec<String>,
    /// Directory and file names never published, at any depth
    pub exclude: Vec<String>,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["html".to_string(), "css".to_string()],
            exclude: vec![
                ".git".to_string(),
                ".github".to_string(),
                ".poempress".to_string(),
                "target".to_string(),
            ],
        }
    }
}

impl StageOptions {
    fn is_excluded_name(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| self.exclude.iter().any(|e| e == name))
            .unwrap_or(false)
    }

    fn has_published_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

/// What staging copied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageReport {
    pub dest: PathBuf,
    /// Top-level files copied
    pub files: Vec<String>,
    /// Top-level directories copied
    pub directories: Vec<String>,
    /// Total number of files, including those inside directories
    pub total_files: usize,
}

/// Copies the publishable contents of `source` into `dest`.
///
/// `dest` may live inside `source`; it is never copied into itself.
pub fn stage_site(source: &Path, dest: &Path, options: &StageOptions) -> ActionResult<StageReport> {
    if !source.is_dir() {
        return Err(ActionError::MissingDirectory(source.to_path_buf()));
    }

    fs::create_dir_all(dest).map_err(|e| ActionError::io(dest, e))?;
    info!("Staging {} -> {}", source.display(), dest.display());

    let exclude = |path: &Path| options.is_excluded_name(path) || same_path(path, dest);

    let mut entries: Vec<_> = fs::read_dir(source)
        .map_err(|e| ActionError::io(source, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    let mut report = StageReport {
        dest: dest.to_path_buf(),
        ..StageReport::default()
    };

    for path in entries {
        if exclude(&path) {
            debug!("Skipping {}", path.display());
            continue;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = dest.join(&name);

        if path.is_dir() {
            let copied = copy_tree(&path, &target, &exclude).map_err(|e| ActionError::io(&path, e))?;
            debug!("Staged directory {} ({} files)", name, copied);
            report.total_files += copied;
            report.directories.push(name);
        } else if options.has_published_extension(&path) {
            fs::copy(&path, &target).map_err(|e| ActionError::io(&path, e))?;
            report.total_files += 1;
            report.files.push(name);
        }
    }

    info!(
        "Staged {} files ({} pages/stylesheets, {} directories)",
        report.total_files,
        report.files.len(),
        report.directories.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("images")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join(".github/workflows")).unwrap();
        fs::write(root.join("index.html"), "<html>").unwrap();
        fs::write(root.join("page2.html"), "<html>").unwrap();
        fs::write(root.join("style.css"), "body{}").unwrap();
        fs::write(root.join("poems.txt"), "source").unwrap();
        fs::write(root.join("generate.py"), "print()").unwrap();
        fs::write(root.join("images/gull.jpg"), "jpg").unwrap();
        fs::write(root.join(".git/HEAD"), "ref").unwrap();
        fs::write(root.join(".github/workflows/pages.yml"), "on: push").unwrap();
    }

    #[test]
    fn test_stage_site_copies_publishable_files() {
        let temp_dir = tempdir().unwrap();
        let source = temp_dir.path().join("repo");
        sample_tree(&source);
        let dest = temp_dir.path().join("public");

        let report = stage_site(&source, &dest, &StageOptions::default()).unwrap();

        assert_eq!(report.files, vec!["index.html", "page2.html", "style.css"]);
        assert_eq!(report.directories, vec!["images"]);
        assert_eq!(report.total_files, 4);
        assert!(dest.join("images/gull.jpg").exists());
        assert!(!dest.join("poems.txt").exists());
        assert!(!dest.join(".git").exists());
        assert!(!dest.join(".github").exists());
    }

    #[test]
    fn test_stage_site_dest_inside_source() {
        let temp_dir = tempdir().unwrap();
        let source = temp_dir.path().to_path_buf();
        sample_tree(&source);
        let dest = source.join("public");

        let report = stage_site(&source, &dest, &StageOptions::default()).unwrap();

        assert!(!report.directories.contains(&"public".to_string()));
        assert!(!dest.join("public").exists());
        assert!(dest.join("index.html").exists());
    }

    #[test]
    fn test_stage_site_extra_exclude() {
        let temp_dir = tempdir().unwrap();
        let source = temp_dir.path().join("repo");
        sample_tree(&source);
        fs::create_dir_all(source.join("src")).unwrap();
        fs::write(source.join("src/main.rs"), "fn main() {}").unwrap();
        let dest = temp_dir.path().join("_site");

        let mut options = StageOptions::default();
        options.exclude.push("src".to_string());
        let report = stage_site(&source, &dest, &options).unwrap();

        assert_eq!(report.directories, vec!["images"]);
        assert!(!dest.join("src").exists());
        assert!(dest.join("index.html").exists());
    }

    #[test]
    fn test_stage_site_extension_case_insensitive() {
        let temp_dir = tempdir().unwrap();
        let source = temp_dir.path().join("repo");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("ABOUT.HTML"), "x").unwrap();

        let dest = temp_dir.path().join("out");
        let report = stage_site(&source, &dest, &StageOptions::default()).unwrap();
        assert_eq!(report.files, vec!["ABOUT.HTML"]);
    }

    #[test]
    fn test_stage_site_missing_source() {
        let temp_dir = tempdir().unwrap();
        let result = stage_site(
            &temp_dir.path().join("nope"),
            &temp_dir.path().join("out"),
            &StageOptions::default(),
        );
        assert!(matches!(result, Err(ActionError::MissingDirectory(_))));
    }
}
