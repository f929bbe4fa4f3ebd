//! Git status trees and hunk-level staging over the git command line.
//!
//! The crate turns `git` output into structures a file-tree or diff view can render, and
//! applies single hunks back to the index or working tree:
//!
//! - [`diff`] parses unified diffs and applies one hunk at a time.
//! - [`tree`] and [`builder`] produce a directory tree annotated with per-path status.
//! - [`detector`] polls the repository and signals when a rebuild is due.
//! - [`history`] walks first-parent history one commit at a time.
//! - [`session`] ties these together for one open view.
//!
//! All git access goes through the [`process::GitRunner`] seam.

pub mod actions;
pub mod builder;
pub mod config;
pub mod detector;
pub mod diff;
pub mod history;
pub mod notify;
pub mod process;
pub mod repo;
pub mod session;
pub mod status;
pub mod submodule;
pub mod tree;
pub mod watcher;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use builder::{build_tree, spawn_build, BuildError, BuildRequest};
pub use config::Config;
pub use detector::{ChangeDetector, ChangeSignal};
pub use history::{HistoryCursor, HistoryMode, HistoryNavigator, Navigation};
pub use notify::{Notice, NoticeLevel, Notify, TracingNotifier};
pub use process::{CommandOutput, GitCli, GitRunner, ProcessError};
pub use repo::{BlobFetch, Repo, RepoError, EMPTY_TREE};
pub use session::{Session, SessionEvent, SessionId, StatusUpdate};
pub use status::StatusCode;
pub use tree::{Node, NodeId, Tree};
