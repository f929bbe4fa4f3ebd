//! Linear history navigation.
//!
//! The navigator starts in [`HistoryMode::Working`], showing the working tree against the
//! base ref. Stepping older pushes commits onto a [`HistoryCursor`]; the commit at the top
//! of the stack is shown against its first parent, or against the empty tree when it is the
//! root commit:
//!
//! ```text
//! working        stack []            index 0
//! step older     stack [c3]          index 1   shows c3 vs c2
//! step older     stack [c3, c2]      index 2   shows c2 vs c1
//! step older     stack [c3, c2, c1]  index 3   shows c1, the root
//! step older     unchanged                     AtRoot
//! step newer     stack [c3, c2, c1]  index 2   shows c2 vs c1
//! step newer     stack [c3, c2, c1]  index 1   shows c3 vs c2
//! step newer     stack []            index 0   working again
//! ```
//!
//! A step older from the root commit is refused with [`Navigation::AtRoot`] and leaves the
//! cursor untouched.

use crate::{
    builder::BuildRequest,
    repo::{Repo, RepoError},
};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HistoryMode {
    #[default]
    Working,
    History,
}

/// Back/forward stack of commit ids. `index` is always within `0..=stack.len()`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryCursor {
    mode: HistoryMode,
    stack: Vec<String>,
    index: usize,
}

impl HistoryCursor {
    pub fn mode(&self) -> HistoryMode {
        self.mode
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn stack(&self) -> &[String] {
        &self.stack
    }

    /// Push `commit` at the cursor, dropping any entries beyond it.
    pub fn push(&mut self, commit: impl Into<String>) {
        self.stack.truncate(self.index);
        self.stack.push(commit.into());
        self.index += 1;
    }

    /// Step back one entry. Returns false at the start.
    pub fn pop(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    /// Re-expose the entry after the cursor, if a pop left one there.
    pub fn redo(&mut self) -> bool {
        if self.index >= self.stack.len() {
            return false;
        }
        self.index += 1;
        true
    }

    /// The entry at the top of the cursor.
    pub fn top(&self) -> Option<&str> {
        self.index
            .checked_sub(1)
            .and_then(|idx| self.stack.get(idx))
            .map(String::as_str)
    }

    /// The commit shown in history mode.
    pub fn shown(&self) -> Option<&str> {
        match self.mode {
            HistoryMode::Working => None,
            HistoryMode::History => self.top(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A commit as shown in history mode. `parent` is `None` for the root commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitView {
    pub commit: String,
    pub parent: Option<String>,
    pub subject: String,
}

/// Outcome of one navigation step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    /// Back to the working tree view.
    Working,
    /// Now showing this commit.
    Commit(CommitView),
    /// The commit has no parent; nothing changed.
    AtRoot { commit: String },
}

pub struct HistoryNavigator {
    repo: Repo,
    base_ref: String,
    cursor: HistoryCursor,
    views: FxHashMap<String, CommitView>,
}

impl HistoryNavigator {
    pub fn new(repo: Repo, base_ref: impl Into<String>) -> Self {
        Self {
            repo,
            base_ref: base_ref.into(),
            cursor: HistoryCursor::default(),
            views: FxHashMap::default(),
        }
    }

    pub fn cursor(&self) -> &HistoryCursor {
        &self.cursor
    }

    pub fn mode(&self) -> HistoryMode {
        self.cursor.mode
    }

    pub fn base_ref(&self) -> &str {
        &self.base_ref
    }

    /// The commit currently shown, with its cached parent and subject.
    pub fn current(&self) -> Option<CommitView> {
        self.cursor
            .shown()
            .and_then(|commit| self.views.get(commit))
            .cloned()
    }

    /// Show the next older commit.
    pub async fn step_older(&mut self) -> Result<Navigation, HistoryError> {
        let Some(top) = self.cursor.shown().map(str::to_string) else {
            let base = self.repo.resolve(&self.base_ref).await?;
            let view = self.view_of(&base).await?;
            self.cursor.reset();
            self.cursor.push(base);
            self.cursor.mode = HistoryMode::History;
            return Ok(Navigation::Commit(view));
        };

        let Some(parent) = self.view_of(&top).await?.parent else {
            debug!("{top} is a root commit");
            return Ok(Navigation::AtRoot { commit: top });
        };

        let view = self.view_of(&parent).await?;
        self.cursor.push(parent);
        Ok(Navigation::Commit(view))
    }

    /// Show the next newer commit, or return to the working tree.
    pub async fn step_newer(&mut self) -> Result<Navigation, HistoryError> {
        if self.cursor.mode == HistoryMode::Working {
            return Ok(Navigation::Working);
        }

        self.cursor.pop();
        self.enter_current().await
    }

    /// Re-show the commit a previous [`step_newer`](Self::step_newer) moved away from.
    pub async fn redo(&mut self) -> Result<Option<Navigation>, HistoryError> {
        if self.cursor.mode != HistoryMode::History || !self.cursor.redo() {
            return Ok(None);
        }
        self.enter_current().await.map(Some)
    }

    async fn enter_current(&mut self) -> Result<Navigation, HistoryError> {
        let Some(commit) = self.cursor.shown().map(str::to_string) else {
            self.reset();
            return Ok(Navigation::Working);
        };
        Ok(Navigation::Commit(self.view_of(&commit).await?))
    }

    /// Parent and subject of `commit`, resolved once and cached.
    async fn view_of(&mut self, commit: &str) -> Result<CommitView, HistoryError> {
        if let Some(view) = self.views.get(commit) {
            return Ok(view.clone());
        }

        let parent = self.repo.parent_of(commit).await?;
        let subject = self.repo.commit_subject(commit).await?;
        let view = CommitView {
            commit: commit.to_string(),
            parent,
            subject,
        };
        self.views.insert(commit.to_string(), view.clone());
        Ok(view)
    }

    /// Back to the working view, dropping the stack.
    pub fn reset(&mut self) {
        self.cursor.reset();
    }

    /// The build matching the current view.
    pub fn build_request(&self, root_path: impl Into<PathBuf>, diff_only: bool) -> BuildRequest {
        match self.current() {
            Some(view) => {
                BuildRequest::commit(root_path, diff_only, &view.commit, view.parent.as_deref())
            },
            None => BuildRequest::against(root_path, diff_only, &self.base_ref),
        }
    }
}
