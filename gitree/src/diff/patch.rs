//! Whole-file patches and single-hunk extraction.
//!
//! A [`FilePatch`] is the output of `git diff -U0 -- <path>` split into its preamble and its
//! hunks, with every line kept byte-for-byte. [`SingleHunkPatch::build`] cuts one hunk back
//! out into a standalone patch that `git apply --unidiff-zero` accepts, which is what lets a
//! single hunk be staged, unstaged or reverted without touching its neighbours.
//!
//! [`pick_hunk_for_cursor`] maps a cursor line in the displayed file to the hunk an action
//! should target.

use super::hunk::{split_lines, Hunk};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("{}: binary files are not supported for hunk actions", path.display())]
    Binary { path: PathBuf },

    #[error("{}: no hunks found", path.display())]
    NoHunks { path: PathBuf },
}

/// Whether git reported the diff as binary instead of producing text hunks.
pub fn is_binary_patch(patch_text: &str) -> bool {
    split_lines(patch_text)
        .any(|line| line.starts_with("Binary files ") || line == "GIT binary patch")
}

/// One file's patch: the preamble before the first hunk, then the hunks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilePatch {
    pub header_lines: Vec<String>,
    pub hunks: Vec<Hunk>,
}

impl FilePatch {
    /// Split patch text on hunk-header boundaries.
    ///
    /// Unlike [`parse_hunks`](super::hunk::parse_hunks), every line after a header belongs to
    /// that hunk verbatim (blank lines and `\ No newline` markers included).
    pub fn parse(patch_text: &str) -> Self {
        let mut patch = Self::default();
        let mut current: Option<Hunk> = None;

        for line in split_lines(patch_text) {
            if let Some(hunk) = Hunk::from_header(line) {
                patch.hunks.extend(current.replace(hunk));
            } else if let Some(hunk) = current.as_mut() {
                hunk.lines.push(line.to_string());
            } else {
                patch.header_lines.push(line.to_string());
            }
        }

        patch.hunks.extend(current);
        patch
    }

    pub fn is_binary(&self) -> bool {
        self.header_lines
            .iter()
            .any(|line| line.starts_with("Binary files ") || line == "GIT binary patch")
    }

    /// Whether the preamble carries both `---` and `+++` path markers.
    pub fn has_path_markers(&self) -> bool {
        let has = |prefix: &str| self.header_lines.iter().any(|l| l.starts_with(prefix));
        has("--- ") && has("+++ ")
    }
}

/// A standalone patch containing exactly one hunk, always ending in one newline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SingleHunkPatch {
    text: String,
}

impl SingleHunkPatch {
    /// Build a patch for `hunk` out of `patch`.
    ///
    /// The preamble is reused when it names both sides; otherwise `a/<path>` and `b/<path>`
    /// markers are synthesized from `rel_path`.
    pub fn build(rel_path: &Path, patch: &FilePatch, hunk: &Hunk) -> Result<Self, PatchError> {
        if patch.is_binary() {
            return Err(PatchError::Binary {
                path: rel_path.to_path_buf(),
            });
        }

        let synthesized;
        let mut lines: Vec<&str> =
            Vec::with_capacity(patch.header_lines.len() + hunk.lines.len() + 3);
        if patch.has_path_markers() {
            lines.extend(patch.header_lines.iter().map(String::as_str));
        } else {
            let path = rel_path.to_string_lossy().replace('\\', "/");
            synthesized = [
                format!("diff --git a/{path} b/{path}"),
                format!("--- a/{path}"),
                format!("+++ b/{path}"),
            ];
            lines.extend(synthesized.iter().map(String::as_str));
        }

        lines.push(&hunk.header);
        lines.extend(hunk.lines.iter().map(String::as_str));

        let mut text = lines.join("\n");
        let trimmed = text.trim_end_matches('\n').len();
        text.truncate(trimmed);
        text.push('\n');

        Ok(Self { text })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Whether `line` falls on `hunk`.
///
/// A pure deletion has no surviving line of its own, so both the line it follows and the
/// one before that count as hits.
fn hunk_contains(hunk: &Hunk, line: u32) -> bool {
    if hunk.is_deletion() {
        line == hunk.new_start || line == hunk.new_start.saturating_sub(1).max(1)
    } else {
        line >= hunk.new_start && line < hunk.new_end()
    }
}

fn hunk_distance(hunk: &Hunk, line: u32) -> u32 {
    if hunk.is_deletion() {
        let before = hunk.new_start.saturating_sub(1).max(1);
        line.abs_diff(hunk.new_start).min(line.abs_diff(before))
    } else if line < hunk.new_start {
        hunk.new_start - line
    } else {
        line - (hunk.new_end() - 1)
    }
}

/// Index of the hunk the 1-based cursor `line` targets.
///
/// Falls back to the nearest hunk (earliest on ties) when none contains the line, so this
/// only returns `None` for an empty list.
pub fn pick_hunk_for_cursor(hunks: &[Hunk], line: u32) -> Option<usize> {
    hunks
        .iter()
        .position(|hunk| hunk_contains(hunk, line))
        .or_else(|| {
            hunks
                .iter()
                .enumerate()
                .min_by_key(|(_, hunk)| hunk_distance(hunk, line))
                .map(|(idx, _)| idx)
        })
}
