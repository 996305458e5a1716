//! Publishing Module
//!
//! Everything between "pages are generated" and "pages are served":
//!
//! - [`stage`]: Collecting the publishable files into one directory
//! - [`artifact`]: Handing a directory from one job to another
//! - [`hosting`]: Swapping an artifact into the static hosting root

pub mod artifact;
pub mod hosting;
pub mod stage;

pub use artifact::{ArtifactManifest, ArtifactStore};
pub use hosting::{HostingTarget, PublishReport};
pub use stage::{stage_site, StageOptions, StageReport};

use std::fs;
use std::io;
use std::path::Path;

/// Recursively copies `src` into `dst`, skipping any entry for which
/// `exclude` returns true. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path, exclude: &dyn Fn(&Path) -> bool) -> io::Result<usize> {
    fs::create_dir_all(dst)?;

    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        if exclude(&src_path) {
            continue;
        }

        let dst_path = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_tree(&src_path, &dst_path, exclude)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Lists every file under `root` as (relative path with `/` separators, size),
/// sorted by path.
pub fn list_files(root: &Path) -> io::Result<Vec<(String, u64)>> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, u64)>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                walk(root, &path, out)?;
            } else {
                let relative = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push((relative, entry.metadata()?.len()));
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    walk(root, root, &mut files)?;
    files.sort();
    Ok(files)
}

/// True if both paths exist and resolve to the same location.
pub(crate) fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
