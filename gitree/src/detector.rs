//! Polling change detection.
//!
//! Each poll reads HEAD, the working-tree status and (optionally) submodule state, hashes
//! the listings and compares against the previous poll:
//!
//! - The first poll after construction or [`ChangeDetector::stop`] only records a baseline.
//! - A moved HEAD yields [`ChangeSignal::Resync`]; the hashes are re-baselined with it.
//! - Otherwise a changed status or submodule hash yields [`ChangeSignal::Refresh`].
//! - Identical hashes yield nothing.
//!
//! Only one poll runs at a time per detector. A poll started while another is in flight
//! returns immediately without touching the recorded state, and a poll still running when
//! the detector is stopped records nothing.

use crate::{
    config::Config,
    repo::{Repo, RepoError},
    submodule::{self, hash_submodules},
    watcher::{self, GitChangeKind},
};
use notify::RecommendedWatcher;
use parking_lot::Mutex;
use rustc_hash::FxHasher;
use smol::{
    channel::{Receiver, Sender},
    Task, Timer,
};
use std::{
    hash::{Hash, Hasher},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeSignal {
    /// Working tree or submodule status changed; rebuild the tree.
    Refresh,
    /// HEAD moved; cached assumptions about the base are stale.
    Resync,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Snapshot {
    head: Option<String>,
    status_hash: u64,
    submodule_hash: Option<u64>,
}

struct Poller {
    repo: Repo,
    toplevel: PathBuf,
    watch_submodules: bool,
    last: Mutex<Option<Snapshot>>,
    in_flight: AtomicBool,
    /// Bumped by every stop; a poll that started under an older epoch records nothing.
    epoch: AtomicU64,
}

/// Clears the in-flight flag when a poll finishes or is dropped mid-await.
struct PollGuard<'a>(&'a AtomicBool);

impl Drop for PollGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Poller {
    async fn poll(&self) -> Result<Option<ChangeSignal>, RepoError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Poll already in flight, skipping tick");
            return Ok(None);
        }
        let _guard = PollGuard(&self.in_flight);
        let epoch = self.epoch.load(Ordering::Acquire);

        let current = self.snapshot().await?;
        let mut last = self.last.lock();
        if self.epoch.load(Ordering::Acquire) != epoch {
            debug!("Detector stopped during poll, discarding snapshot");
            return Ok(None);
        }

        let signal = match last.as_ref() {
            None => None,
            Some(previous) if previous.head != current.head => Some(ChangeSignal::Resync),
            Some(previous)
                if previous.status_hash != current.status_hash
                    || previous.submodule_hash != current.submodule_hash =>
            {
                Some(ChangeSignal::Refresh)
            },
            Some(_) => None,
        };

        *last = Some(current);
        Ok(signal)
    }

    async fn snapshot(&self) -> Result<Snapshot, RepoError> {
        let head = self.repo.head().await?;
        let status = self.repo.status_porcelain().await?;

        let submodule_hash = if self.watch_submodules {
            let infos = submodule::scan(&self.repo, &self.toplevel).await?;
            Some(hash_submodules(&infos))
        } else {
            None
        };

        Ok(Snapshot {
            head,
            status_hash: hash_status(&status),
            submodule_hash,
        })
    }
}

/// Hash of porcelain output that does not depend on line order.
pub fn hash_status(output: &str) -> u64 {
    let mut lines: Vec<&str> = output.lines().filter(|l| !l.is_empty()).collect();
    lines.sort_unstable();

    let mut hasher = FxHasher::default();
    lines.hash(&mut hasher);
    hasher.finish()
}

pub struct ChangeDetector {
    poller: Arc<Poller>,
    interval: Duration,
    watch_git_dir: bool,
    task: Option<Task<()>>,
    watcher: Option<RecommendedWatcher>,
}

impl ChangeDetector {
    /// A stopped detector for the repository whose top level is `toplevel`.
    pub fn new(repo: Repo, toplevel: impl Into<PathBuf>, config: &Config) -> Self {
        let toplevel = toplevel.into();
        Self {
            poller: Arc::new(Poller {
                repo: repo.at(&toplevel),
                toplevel,
                watch_submodules: config.watch_submodules,
                last: Mutex::new(None),
                in_flight: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
            }),
            interval: config.poll_interval(),
            watch_git_dir: config.watch_git_dir,
            task: None,
            watcher: None,
        }
    }

    /// Run one poll now.
    pub async fn poll(&self) -> Result<Option<ChangeSignal>, RepoError> {
        self.poller.poll().await
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Start polling in the background, sending every signal to `sender`.
    ///
    /// The loop ends when the receiving side is dropped or [`stop`](Self::stop) is called.
    /// Restarting a running detector replaces its loop.
    pub fn start(&mut self, sender: Sender<ChangeSignal>) {
        self.stop();

        let wakes = if self.watch_git_dir {
            let (wake_tx, wake_rx) = smol::channel::bounded(1);
            self.watcher = watcher::start_watching(&self.poller.toplevel, wake_tx);
            self.watcher.as_ref().map(|_| wake_rx)
        } else {
            None
        };

        let poller = self.poller.clone();
        let interval = self.interval;
        self.task = Some(smol::spawn(async move {
            loop {
                match poller.poll().await {
                    Ok(Some(signal)) => {
                        info!("Repository change detected: {signal:?}");
                        if sender.send(signal).await.is_err() {
                            break;
                        }
                    },
                    Ok(None) => {},
                    Err(err) => warn!("Change poll failed: {err}"),
                }
                wait_for_tick(interval, wakes.as_ref()).await;
            }
        }));
    }

    /// Stop polling and forget the baseline, so the next poll is treated as the first.
    pub fn stop(&mut self) {
        self.task = None;
        self.watcher = None;
        let mut last = self.poller.last.lock();
        self.poller.epoch.fetch_add(1, Ordering::AcqRel);
        *last = None;
    }
}

impl Drop for ChangeDetector {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn wait_for_tick(interval: Duration, wakes: Option<&Receiver<GitChangeKind>>) {
    let timer = async {
        Timer::after(interval).await;
    };
    let wake = async {
        match wakes {
            Some(rx) => match rx.recv().await {
                Ok(kind) => {
                    debug!("Woken by git {kind:?} change");
                    while rx.try_recv().is_ok() {}
                },
                Err(_) => smol::future::pending::<()>().await,
            },
            None => smol::future::pending::<()>().await,
        }
    };
    smol::future::or(timer, wake).await;
}
