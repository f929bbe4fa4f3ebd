//! Asynchronous status tree construction.
//!
//! A build picks one of four sources for its statuses, then populates a fresh [`Tree`]:
//!
//! | `commit` | `parent` | `history` | statuses from                                   |
//! |----------|----------|-----------|-------------------------------------------------|
//! | none     | -        | -         | `status --porcelain`                            |
//! | set      | none     | false     | `diff --name-status <commit>` + porcelain       |
//! | set      | set      | -         | `diff --name-status <parent> <commit>`          |
//! | set      | none     | true      | `diff --name-status <empty tree> <commit>`      |
//!
//! Git reports paths relative to the repository top level, which is resolved first. The
//! commands of one build run strictly in sequence. Separate builds are independent and the
//! consumer keeps whichever finishes last.

use crate::{
    repo::{Repo, RepoError, EMPTY_TREE},
    status::{merge_with_working, parse_name_status, parse_porcelain, StatusMap},
    submodule,
    tree::Tree,
};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("Failed to scan {}: {source}", path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildRequest {
    pub root_path: PathBuf,
    pub diff_only: bool,
    pub commit: Option<String>,
    pub parent: Option<String>,
    /// Showing a historical commit rather than the working tree.
    pub history: bool,
    /// Overlay changed files inside submodules. Ignored for historical builds.
    pub include_submodules: bool,
}

impl BuildRequest {
    /// Live working-tree status, no base ref.
    pub fn working(root_path: impl Into<PathBuf>, diff_only: bool) -> Self {
        Self {
            root_path: root_path.into(),
            diff_only,
            commit: None,
            parent: None,
            history: false,
            include_submodules: false,
        }
    }

    /// Working tree compared against `base`.
    pub fn against(root_path: impl Into<PathBuf>, diff_only: bool, base: &str) -> Self {
        Self {
            commit: Some(base.to_string()),
            ..Self::working(root_path, diff_only)
        }
    }

    /// What `commit` changed relative to `parent`, or to the empty tree for a root commit.
    pub fn commit(
        root_path: impl Into<PathBuf>,
        diff_only: bool,
        commit: &str,
        parent: Option<&str>,
    ) -> Self {
        Self {
            commit: Some(commit.to_string()),
            parent: parent.map(str::to_string),
            history: true,
            ..Self::working(root_path, diff_only)
        }
    }

    pub fn with_submodules(mut self, include: bool) -> Self {
        self.include_submodules = include;
        self
    }

    fn is_historical(&self) -> bool {
        self.history || self.parent.is_some()
    }
}

/// Collect statuses for `request`, keyed relative to the top level.
async fn collect_statuses(git: &Repo, request: &BuildRequest) -> Result<StatusMap, RepoError> {
    let statuses = match (request.commit.as_deref(), request.parent.as_deref()) {
        (Some(commit), Some(parent)) => {
            parse_name_status(&git.name_status(&[parent, commit]).await?)
        },
        (Some(commit), None) if request.history => {
            parse_name_status(&git.name_status(&[EMPTY_TREE, commit]).await?)
        },
        (Some(commit), None) => {
            let diff = parse_name_status(&git.name_status(&[commit]).await?);
            let working = parse_porcelain(&git.status_porcelain().await?);
            merge_with_working(diff, working)
        },
        (None, _) => parse_porcelain(&git.status_porcelain().await?),
    };
    Ok(statuses)
}

/// Build a tree for `request` using `repo`'s runner.
///
/// On error nothing is returned; a partially populated tree is never exposed.
pub async fn build_tree(repo: &Repo, request: &BuildRequest) -> Result<Tree, BuildError> {
    debug!("Building status tree: {request:?}");

    let toplevel = repo.toplevel().await?;
    let git = repo.at(&toplevel);
    let mut statuses = collect_statuses(&git, request).await?;

    if request.include_submodules && !request.is_historical() {
        for info in submodule::scan(&git, &toplevel).await? {
            // Absolute keys; joining them onto the top level leaves them unchanged.
            statuses.extend(info.changed_files);
        }
    }

    let requested = request.root_path.clone();
    let root_path =
        smol::unblock(move || std::fs::canonicalize(&requested).unwrap_or(requested)).await;

    let mut tree = if request.diff_only {
        Tree::new(root_path)
    } else {
        let path = root_path.clone();
        smol::unblock(move || Tree::scan(path))
            .await
            .map_err(|source| BuildError::Scan {
                path: root_path,
                source,
            })?
    };

    tree.apply_statuses(&statuses, &toplevel);
    tree.sort();
    tree.update_parent_statuses();

    info!(
        "Built status tree for {} ({} changed paths)",
        tree.root_path().display(),
        statuses.len()
    );
    Ok(tree)
}

/// Build on the smol executor and hand the result to `on_done`. Returns immediately.
pub fn spawn_build<F>(repo: Repo, request: BuildRequest, on_done: F)
where
    F: FnOnce(Result<Tree, BuildError>) + Send + 'static,
{
    smol::spawn(async move {
        let result = build_tree(&repo, &request).await;
        on_done(result);
    })
    .detach();
}
