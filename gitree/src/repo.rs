//! Git repository queries.
//!
//! [`Repo`] pairs a working directory with a [`GitRunner`] and turns the raw commands the
//! rest of the crate needs into typed results. Exit codes are interpreted here, once:
//!
//! - `rev-parse --verify <ref>` failing is a resolution error ([`RepoError::Unresolved`]).
//! - `rev-parse <ref>^` failing means the commit has no parent.
//! - `show <ref>:<path>` exiting with 128 means the path did not exist at that ref.
//! - `diff --no-index` exiting with 1 means the inputs differ, not that git failed.

use crate::{
    diff::hunk::{parse_hunks, Hunk},
    process::{args, CommandOutput, GitCli, GitRunner, ProcessError},
};
use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tracing::debug;

/// Object id of the empty tree, used as the parent side when diffing a root commit.
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Exit code git uses for fatal errors, including a path missing from a tree.
const EXIT_FATAL: i32 = 128;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Cannot resolve '{reference}': {message}")]
    Unresolved { reference: String, message: String },

    #[error("git {command} failed ({}): {stderr}", exit_label(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "killed".to_string(), |code| format!("exit {code}"))
}

/// Result of reading a file's content at a ref.
///
/// Kept three-way: a file that did not exist at the ref (newly added since) is a normal
/// outcome for callers, distinct from git failing outright.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlobFetch {
    Present(String),
    Absent,
    Failed { code: Option<i32>, message: String },
}

/// A working directory plus the runner used to query it.
#[derive(Clone)]
pub struct Repo {
    root: PathBuf,
    runner: Arc<dyn GitRunner>,
}

impl std::fmt::Debug for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repo").field("root", &self.root).finish()
    }
}

impl Repo {
    pub fn new(root: impl Into<PathBuf>, runner: Arc<dyn GitRunner>) -> Self {
        Self {
            root: root.into(),
            runner,
        }
    }

    /// A repository driven by the `git` executable.
    pub fn with_cli(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Arc::new(GitCli::new()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runner(&self) -> Arc<dyn GitRunner> {
        self.runner.clone()
    }

    /// The same runner, rooted at `dir` (e.g. a submodule checkout).
    pub fn at(&self, dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, self.runner.clone())
    }

    pub async fn git(&self, list: &[&str]) -> Result<CommandOutput, ProcessError> {
        self.runner.run(&self.root, &args(list)).await
    }

    /// Run and require one of `accepted` exit codes.
    async fn git_expect(&self, list: &[&str], accepted: &[i32]) -> Result<String, RepoError> {
        let output = self.git(list).await?;
        match output.exit_code {
            Some(code) if accepted.contains(&code) => Ok(output.stdout),
            code => Err(RepoError::CommandFailed {
                command: list.join(" "),
                code,
                stderr: output.stderr_summary(),
            }),
        }
    }

    /// Absolute path of the repository's top-level directory.
    pub async fn toplevel(&self) -> Result<PathBuf, RepoError> {
        let stdout = self
            .git_expect(&["rev-parse", "--show-toplevel"], &[0])
            .await?;
        Ok(PathBuf::from(stdout.trim_end_matches(['\n', '\r'])))
    }

    /// Current HEAD commit, `None` on an unborn branch.
    pub async fn head(&self) -> Result<Option<String>, RepoError> {
        let output = self.git(&["rev-parse", "HEAD"]).await?;
        Ok(output
            .success()
            .then(|| output.stdout.trim().to_string())
            .filter(|sha| !sha.is_empty()))
    }

    /// Resolve any ref expression to a commit id.
    pub async fn resolve(&self, reference: &str) -> Result<String, RepoError> {
        let output = self.git(&["rev-parse", "--verify", reference]).await?;
        if !output.success() {
            return Err(RepoError::Unresolved {
                reference: reference.to_string(),
                message: output.stderr_summary(),
            });
        }
        Ok(output.stdout.trim().to_string())
    }

    /// The first parent of `commit`, `None` for a root commit.
    pub async fn parent_of(&self, commit: &str) -> Result<Option<String>, RepoError> {
        let parent_ref = format!("{commit}^");
        let output = self.git(&["rev-parse", &parent_ref]).await?;
        if !output.success() {
            debug!("{commit} has no parent: {}", output.stderr_summary());
            return Ok(None);
        }
        Ok(Some(output.stdout.trim().to_string()))
    }

    /// One-line commit message.
    pub async fn commit_subject(&self, commit: &str) -> Result<String, RepoError> {
        let stdout = self
            .git_expect(&["log", "--format=%s", "-n", "1", commit], &[0])
            .await?;
        Ok(stdout.trim_end().to_string())
    }

    /// `status --porcelain --untracked-files=all` output.
    pub async fn status_porcelain(&self) -> Result<String, RepoError> {
        self.git_expect(&["status", "--porcelain", "--untracked-files=all"], &[0])
            .await
    }

    /// `diff --name-status <refs...>` output. Exit 1 ("differences found") is accepted.
    pub async fn name_status(&self, refs: &[&str]) -> Result<String, RepoError> {
        let mut list = vec!["diff", "--name-status"];
        list.extend_from_slice(refs);
        self.git_expect(&list, &[0, 1]).await
    }

    pub async fn submodule_status(&self) -> Result<String, RepoError> {
        self.git_expect(&["submodule", "status"], &[0]).await
    }

    /// Content of `rel_path` (relative to the top level) at `reference`.
    pub async fn show_file(&self, reference: &str, rel_path: &Path) -> BlobFetch {
        let object = format!("{reference}:{}", slash_path(rel_path));
        let output = match self.git(&["show", &object]).await {
            Ok(output) => output,
            Err(err) => {
                return BlobFetch::Failed {
                    code: None,
                    message: err.to_string(),
                }
            },
        };

        match output.exit_code {
            Some(0) => BlobFetch::Present(output.stdout),
            Some(EXIT_FATAL) => BlobFetch::Absent,
            code => BlobFetch::Failed {
                code,
                message: output.stderr_summary(),
            },
        }
    }

    /// Zero-context patch for one path: working tree vs index, or index vs HEAD if `cached`.
    pub async fn file_patch(&self, rel_path: &Path, cached: bool) -> Result<String, RepoError> {
        let path = slash_path(rel_path);
        let mut list = vec!["diff", "-U0"];
        if cached {
            list.push("--cached");
        }
        list.extend(["--", path.as_str()]);
        self.git_expect(&list, &[0, 1]).await
    }

    /// Patch between two arbitrary files.
    pub async fn diff_no_index(&self, old: &Path, new: &Path) -> Result<String, RepoError> {
        let old = old.to_string_lossy();
        let new = new.to_string_lossy();
        self.git_expect(&["diff", "--no-index", &old, &new], &[0, 1])
            .await
    }

    /// Hunks between `rel_path` (relative to the top level) at `reference` and live `text`
    /// that has no file on disk.
    ///
    /// A path that did not exist at `reference` diffs against empty content, so every line
    /// comes back as an addition.
    pub async fn diff_text_against_ref(
        &self,
        reference: &str,
        rel_path: &Path,
        text: &str,
    ) -> Result<Vec<Hunk>, RepoError> {
        let base = match self.show_file(reference, rel_path).await {
            BlobFetch::Present(content) => content,
            BlobFetch::Absent => String::new(),
            BlobFetch::Failed { code, message } => {
                return Err(RepoError::CommandFailed {
                    command: format!("show {reference}:{}", slash_path(rel_path)),
                    code,
                    stderr: message,
                })
            },
        };

        let mut old = tempfile::NamedTempFile::new()?;
        old.write_all(base.as_bytes())?;
        old.flush()?;
        let mut new = tempfile::NamedTempFile::new()?;
        new.write_all(text.as_bytes())?;
        new.flush()?;

        let patch = self.diff_no_index(old.path(), new.path()).await?;
        Ok(parse_hunks(&patch))
    }
}

/// Path with `/` separators, the form git uses in pathspecs and `<ref>:<path>`.
pub(crate) fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
