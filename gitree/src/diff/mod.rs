//! Unified diff parsing and single-hunk patch application.
//!
//! - [`hunk`] parses `git diff` output into [`Hunk`]s.
//! - [`patch`] splits a whole-file patch and re-extracts one hunk as a standalone patch.
//! - [`apply`] feeds that patch to `git apply` for staging, unstaging or reverting.

pub mod apply;
pub mod hunk;
pub mod patch;

pub use apply::{apply_patch, ApplyError, ApplyMode};
pub use hunk::{hunk_starts, next_hunk_start, parse_hunks, prev_hunk_start, Hunk, LineKind};
pub use patch::{is_binary_patch, pick_hunk_for_cursor, FilePatch, PatchError, SingleHunkPatch};
