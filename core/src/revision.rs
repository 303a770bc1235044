//! Source revision lookup.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::{ContainrError, Result};

/// Short revision identifier of the current source tree.
///
/// Resolved once per invocation via `git rev-parse --short HEAD`. Commands
/// that need a revision fail rather than substituting a default.
pub fn git_revision() -> Result<String> {
    revision_from(Path::new("git"))
}

fn revision_from(program: &Path) -> Result<String> {
    debug!("{} rev-parse --short HEAD", program.display());
    let output = Command::new(program)
        .args(["rev-parse", "--short", "HEAD"])
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(ContainrError::RevisionError(format!(
            "{stderr} (init git for this repository with `git init`)"
        )));
    }

    let revision = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if revision.is_empty() {
        return Err(ContainrError::RevisionError(
            "git returned an empty revision".to_string(),
        ));
    }
    Ok(revision)
}
