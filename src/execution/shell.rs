//! Shell Step Execution
//!
//! Runs a `run:` script through bash with `set -e`. The script can publish
//! step outputs by appending to the file named in `GITHUB_OUTPUT`, either
//! as `key=value` lines or as a multi-line block:
//!
//! ```text
//! key<<EOF
//! line one
//! line two
//! EOF
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, error, warn};

use crate::error::{ActionError, ActionResult};

/// Where a script runs and what it sees.
#[derive(Debug, Clone)]
pub struct ShellInvocation<'a> {
    /// Used to name the script and output files
    pub name: &'a str,
    pub script: &'a str,
    pub workspace: &'a Path,
    /// Directory the script runs in
    pub working_dir: &'a Path,
    /// Directory for the generated script and output files
    pub scratch_dir: &'a Path,
    pub env: &'a BTreeMap<String, String>,
}

/// Runs the script and returns the outputs it wrote.
pub fn run_script(invocation: &ShellInvocation<'_>) -> ActionResult<BTreeMap<String, String>> {
    let name = sanitize(invocation.name);

    if !invocation.working_dir.is_dir() {
        return Err(ActionError::MissingDirectory(
            invocation.working_dir.to_path_buf(),
        ));
    }

    fs::create_dir_all(invocation.scratch_dir)
        .map_err(|e| ActionError::io(invocation.scratch_dir, e))?;

    let script_path = create_execution_script(invocation.scratch_dir, &name, invocation.script)?;
    let output_path = invocation.scratch_dir.join(format!("{}.output", name));
    File::create(&output_path).map_err(|e| ActionError::io(&output_path, e))?;

    let mut cmd = Command::new("bash");
    cmd.arg(&script_path)
        .current_dir(invocation.working_dir)
        .envs(invocation.env)
        .env("GITHUB_WORKSPACE", invocation.workspace)
        .env("GITHUB_OUTPUT", &output_path);
    debug!("Executing in directory: {}", invocation.working_dir.display());

    let output = cmd.output().map_err(|e| ActionError::io(&script_path, e))?;

    if let Err(e) = fs::remove_file(&script_path) {
        warn!("Failed to clean up script {}: {}", script_path.display(), e);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        error!(
            "Script '{}' failed with exit code: {:?}",
            invocation.name,
            output.status.code()
        );
        if !stderr.trim().is_empty() {
            error!("stderr:\n{}", stderr.trim_end());
        }
        if !stdout.trim().is_empty() {
            debug!("stdout:\n{}", stdout.trim_end());
        }
        return Err(ActionError::CommandFailed {
            code: output.status.code(),
        });
    }

    if !stdout.trim().is_empty() {
        debug!("Script '{}' output:\n{}", invocation.name, stdout.trim_end());
    }
    if !stderr.trim().is_empty() {
        debug!("Script '{}' stderr:\n{}", invocation.name, stderr.trim_end());
    }

    let written = fs::read_to_string(&output_path).map_err(|e| ActionError::io(&output_path, e))?;
    if let Err(e) = fs::remove_file(&output_path) {
        warn!("Failed to clean up {}: {}", output_path.display(), e);
    }

    Ok(parse_output_file(&written))
}

/// Parses the contents of a `GITHUB_OUTPUT` file.
pub fn parse_output_file(content: &str) -> BTreeMap<String, String> {
    let mut outputs = BTreeMap::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }

        let heredoc = match (line.find("<<"), line.find('=')) {
            (Some(marker), Some(eq)) => marker < eq,
            (Some(_), None) => true,
            _ => false,
        };

        if let Some((key, delimiter)) = line.split_once("<<").filter(|_| heredoc) {
            let delimiter = delimiter.trim();
            let mut value = Vec::new();
            for body in lines.by_ref() {
                if body == delimiter {
                    break;
                }
                value.push(body);
            }
            outputs.insert(key.trim().to_string(), value.join("\n"));
        } else if let Some((key, value)) = line.split_once('=') {
            outputs.insert(key.trim().to_string(), value.to_string());
        } else {
            warn!("Ignoring malformed output line: '{}'", line);
        }
    }

    outputs
}

/// Writes the script to `<dir>/<name>.sh`.
fn create_execution_script(dir: &Path, name: &str, script: &str) -> ActionResult<PathBuf> {
    let script_path = dir.join(format!("{}.sh", name));
    let write = || -> std::io::Result<()> {
        let mut file = File::create(&script_path)?;
        writeln!(file, "#!/bin/bash")?;
        writeln!(file, "set -e")?;
        writeln!(file, "{}", script)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755))?;
        }
        Ok(())
    };
    write().map_err(|e| ActionError::io(&script_path, e))?;
    Ok(script_path)
}

/// Keeps file names to `[A-Za-z0-9_-]`.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "step".to_string()
    } else {
        cleaned
    }
}
