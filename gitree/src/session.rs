//! One open status view over one repository.
//!
//! A [`Session`] owns everything the view needs: its repository handle, configuration,
//! history cursor, the current [`Tree`], and an optional [`ChangeDetector`]. Builds run on
//! the executor and report back over the session's status channel as [`StatusUpdate`]s;
//! the single consumer loop applies them with [`Session::apply_update`], so only the
//! session ever replaces its tree.
//!
//! Updates are checked against the session id and the session being open before they are
//! applied, since a build may outlive the view that requested it. Among valid updates the
//! last one to complete wins. A failed build is reported and the previous tree is kept.

use crate::{
    actions::{self, HunkActionError},
    builder::{spawn_build, BuildError},
    config::Config,
    detector::{ChangeDetector, ChangeSignal},
    diff::{apply::ApplyMode, hunk::Hunk},
    history::{HistoryError, HistoryMode, HistoryNavigator, Navigation},
    notify::{Notice, NoticeLevel, Notify},
    process::GitCli,
    repo::{Repo, RepoError},
    tree::Tree,
};
use smol::channel::{Receiver, Sender};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type SessionId = Uuid;

/// Result of one build, addressed to the session that requested it.
#[derive(Debug)]
pub struct StatusUpdate {
    pub session: SessionId,
    pub generation: u64,
    pub result: Result<Tree, BuildError>,
}

#[derive(Debug)]
pub enum SessionEvent {
    Status(StatusUpdate),
    Change(ChangeSignal),
}

pub struct Session {
    id: SessionId,
    repo: Repo,
    config: Config,
    root_path: PathBuf,
    history: HistoryNavigator,
    tree: Option<Tree>,
    tree_generation: u64,
    next_generation: u64,
    detector: Option<ChangeDetector>,
    updates: (Sender<StatusUpdate>, Receiver<StatusUpdate>),
    changes: (Sender<ChangeSignal>, Receiver<ChangeSignal>),
    notifier: Arc<dyn Notify>,
    open: bool,
}

impl Session {
    /// Open a session on `root_path` using the configured git executable.
    pub fn open(root_path: impl Into<PathBuf>, config: Config, notifier: Arc<dyn Notify>) -> Self {
        let root_path = root_path.into();
        let repo = Repo::new(
            root_path.clone(),
            Arc::new(GitCli::with_program(&config.git_program)),
        );
        Self::with_repo(repo, root_path, config, notifier)
    }

    pub fn with_repo(
        repo: Repo,
        root_path: impl Into<PathBuf>,
        config: Config,
        notifier: Arc<dyn Notify>,
    ) -> Self {
        let id = Uuid::new_v4();
        let root_path = root_path.into();
        debug!("Opening session {id} on {}", root_path.display());

        Self {
            id,
            history: HistoryNavigator::new(repo.clone(), config.base_ref.clone()),
            repo,
            config,
            root_path,
            tree: None,
            tree_generation: 0,
            next_generation: 0,
            detector: None,
            updates: smol::channel::unbounded(),
            changes: smol::channel::unbounded(),
            notifier,
            open: true,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repo(&self) -> &Repo {
        &self.repo
    }

    pub fn history(&self) -> &HistoryNavigator {
        &self.history
    }

    /// The most recently applied tree.
    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    /// Generation of the build that produced [`tree`](Self::tree), 0 before the first one.
    pub fn tree_generation(&self) -> u64 {
        self.tree_generation
    }

    /// Sender for status updates, for builds started outside
    /// [`request_refresh`](Self::request_refresh).
    pub fn update_sender(&self) -> Sender<StatusUpdate> {
        self.updates.0.clone()
    }

    fn report(&self, notice: Notice) {
        if notice.level != NoticeLevel::Info {
            warn!("[session {}] {notice}", self.id);
        }
        self.notifier.notify(notice);
    }

    /// Start a build for the current view. Returns its generation; the result arrives as a
    /// [`SessionEvent::Status`].
    pub fn request_refresh(&mut self) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        let request = self
            .history
            .build_request(self.root_path.clone(), self.config.diff_only)
            .with_submodules(self.config.watch_submodules);

        let session = self.id;
        let sender = self.updates.0.clone();
        spawn_build(self.repo.clone(), request, move |result| {
            if sender
                .try_send(StatusUpdate {
                    session,
                    generation,
                    result,
                })
                .is_err()
            {
                debug!("Session {session} is gone, dropping build {generation}");
            }
        });

        generation
    }

    /// Apply a finished build. Returns whether the tree was replaced.
    pub fn apply_update(&mut self, update: StatusUpdate) -> bool {
        if update.session != self.id {
            debug!(
                "Ignoring build {} for session {} in {}",
                update.generation, update.session, self.id
            );
            return false;
        }
        if !self.open {
            debug!("Ignoring build {} for closed session {}", update.generation, self.id);
            return false;
        }

        match update.result {
            Ok(tree) => {
                self.tree = Some(tree);
                self.tree_generation = update.generation;
                true
            },
            Err(err) => {
                self.report(Notice::error(format!("Status refresh failed: {err}")));
                false
            },
        }
    }

    /// Wait for the next build result or detector signal.
    pub async fn next_event(&self) -> Option<SessionEvent> {
        let status = async { self.updates.1.recv().await.ok().map(SessionEvent::Status) };
        let change = async { self.changes.1.recv().await.ok().map(SessionEvent::Change) };
        smol::future::or(status, change).await
    }

    /// React to one event: apply builds, rebuild on detected changes.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Status(update) => {
                self.apply_update(update);
            },
            SessionEvent::Change(ChangeSignal::Refresh) => {
                self.request_refresh();
            },
            SessionEvent::Change(ChangeSignal::Resync) => {
                if self.history.mode() == HistoryMode::Working {
                    info!("HEAD moved, rebuilding session {}", self.id);
                    self.request_refresh();
                } else {
                    debug!("HEAD moved while viewing history, keeping the commit view");
                }
            },
        }
    }

    /// Start background change detection.
    pub async fn start_watching(&mut self) -> Result<(), RepoError> {
        let toplevel = self.repo.toplevel().await?;
        let mut detector = ChangeDetector::new(self.repo.clone(), toplevel, &self.config);
        detector.start(self.changes.0.clone());
        self.detector = Some(detector);
        Ok(())
    }

    pub fn is_watching(&self) -> bool {
        self.detector.as_ref().is_some_and(ChangeDetector::is_running)
    }

    /// Stop detection, forget history and drop the tree. Builds still in flight are
    /// discarded when they arrive.
    pub fn close(&mut self) {
        if let Some(mut detector) = self.detector.take() {
            detector.stop();
        }
        self.history.reset();
        self.tree = None;
        self.open = false;
        debug!("Closed session {}", self.id);
    }

    async fn hunk_action(&mut self, path: &Path, line: u32, mode: ApplyMode) -> bool {
        match actions::apply_hunk_at(&self.repo, path, line, mode).await {
            Ok(()) => {
                self.request_refresh();
                true
            },
            Err(err) => {
                let notice = match &err {
                    HunkActionError::Patch(_) | HunkActionError::NoHunkAtCursor { .. } => {
                        Notice::warn(err.to_string())
                    },
                    _ => Notice::error(err.to_string()),
                };
                self.report(notice);
                false
            },
        }
    }

    pub async fn stage_hunk(&mut self, path: &Path, line: u32) -> bool {
        self.hunk_action(path, line, ApplyMode::Stage).await
    }

    pub async fn unstage_hunk(&mut self, path: &Path, line: u32) -> bool {
        self.hunk_action(path, line, ApplyMode::Unstage).await
    }

    pub async fn revert_hunk(&mut self, path: &Path, line: u32) -> bool {
        self.hunk_action(path, line, ApplyMode::Revert).await
    }

    /// Addressable hunk-start lines of `path`. Empty, with a notice, on failure.
    pub async fn hunk_starts(&self, path: &Path) -> Vec<u32> {
        match actions::hunk_starts_for(&self.repo, path).await {
            Ok(starts) => starts,
            Err(err) => {
                self.report(Notice::error(err.to_string()));
                Vec::new()
            },
        }
    }

    /// Hunks between unsaved buffer `text` for `path` and the session's base ref.
    pub async fn live_hunks(&self, path: &Path, text: &str) -> Vec<Hunk> {
        match actions::live_hunks(&self.repo, self.history.base_ref(), path, text).await {
            Ok(hunks) => hunks,
            Err(err) => {
                self.report(Notice::error(err.to_string()));
                Vec::new()
            },
        }
    }

    pub async fn step_older(&mut self) -> Option<Navigation> {
        let result = self.history.step_older().await;
        self.after_navigation(result)
    }

    pub async fn step_newer(&mut self) -> Option<Navigation> {
        let result = self.history.step_newer().await;
        self.after_navigation(result)
    }

    fn after_navigation(
        &mut self,
        result: Result<Navigation, HistoryError>,
    ) -> Option<Navigation> {
        match result {
            Ok(Navigation::AtRoot { commit }) => {
                self.report(Notice::info(format!(
                    "{} is the root commit, there is nothing older",
                    short(&commit)
                )));
                Some(Navigation::AtRoot { commit })
            },
            Ok(navigation) => {
                if let Navigation::Commit(view) = &navigation {
                    self.report(Notice::info(format!(
                        "{} {}",
                        short(&view.commit),
                        view.subject
                    )));
                }
                self.request_refresh();
                Some(navigation)
            },
            Err(err) => {
                self.report(Notice::error(err.to_string()));
                None
            },
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.open {
            self.close();
        }
    }
}

fn short(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}
