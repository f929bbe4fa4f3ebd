//! Applying a single-hunk patch with `git apply`.
//!
//! The patch is written to a scoped temp file that is removed when this function returns,
//! on every path: success, git failure, I/O failure, or the future being dropped mid-await.

use super::patch::SingleHunkPatch;
use crate::repo::Repo;
use std::io::Write;
use thiserror::Error;
use tracing::{debug, warn};

/// Where a hunk goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyMode {
    /// Apply to the index.
    Stage,
    /// Reverse-apply to the index.
    Unstage,
    /// Reverse-apply to the working tree.
    Revert,
}

impl ApplyMode {
    /// Flags passed to `git apply` after the common ones.
    pub fn flags(self) -> &'static [&'static str] {
        match self {
            Self::Stage => &["--cached"],
            Self::Unstage => &["--cached", "-R"],
            Self::Revert => &["-R"],
        }
    }

    /// Whether the hunk is taken from the staged diff (index vs HEAD) rather than the
    /// unstaged one (working tree vs index).
    pub fn reads_index(self) -> bool {
        matches!(self, Self::Unstage)
    }

    pub fn verb(self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::Unstage => "unstage",
            Self::Revert => "revert",
        }
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApplyError {
    pub message: String,
}

impl ApplyError {
    fn io(context: &str, err: std::io::Error) -> Self {
        Self {
            message: format!("{context}: {err}"),
        }
    }
}

/// Apply `patch` in `repo`'s directory, which must be the repository top level.
///
/// Nothing about partial application is implied by an error; git either applies the whole
/// hunk or nothing.
pub async fn apply_patch(
    repo: &Repo,
    patch: &SingleHunkPatch,
    mode: ApplyMode,
) -> Result<(), ApplyError> {
    let mut file = tempfile::Builder::new()
        .prefix("gitree-hunk-")
        .suffix(".patch")
        .tempfile()
        .map_err(|e| ApplyError::io("Failed to create patch file", e))?;
    file.write_all(patch.as_str().as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| ApplyError::io("Failed to write patch file", e))?;

    let patch_path = file.path().to_string_lossy().into_owned();
    let mut list = vec!["apply", "--unidiff-zero", "--whitespace=nowarn"];
    list.extend_from_slice(mode.flags());
    list.push(&patch_path);

    let result = repo.git(&list).await;

    if let Err(err) = file.close() {
        warn!("Failed to remove patch file {patch_path}: {err}");
    }

    let output = result.map_err(|e| ApplyError {
        message: e.to_string(),
    })?;

    if !output.success() {
        return Err(ApplyError {
            message: format!("Failed to {} hunk: {}", mode.verb(), output.stderr_summary()),
        });
    }

    debug!("Applied hunk ({}) in {}", mode.verb(), repo.root().display());
    Ok(())
}
