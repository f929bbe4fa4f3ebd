//! Filesystem wakeups for the change detector.
//!
//! Watches `.git/index`, `.git/HEAD` and `.git/refs/` so that an external `git add`,
//! `commit` or `checkout` wakes the [`ChangeDetector`](crate::detector::ChangeDetector)
//! before its next timer tick. A wakeup only triggers a poll; whether anything is reported
//! is still decided by hash comparison.

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use smol::channel::Sender;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Classification of a git filesystem event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitChangeKind {
    /// `.git/index` changed (add, reset, commit, stash)
    Index,
    /// `.git/HEAD` or refs changed (checkout, commit, branch)
    Head,
}

/// Start watching the git directory of the repository at `toplevel`.
///
/// Returns the watcher handle, which must be kept alive for as long as events are wanted.
/// Returns [`None`] when there is no `.git` directory (e.g. a worktree whose `.git` is a
/// file) or the watcher cannot be created; polling still works without it.
pub fn start_watching(
    toplevel: &Path,
    sender: Sender<GitChangeKind>,
) -> Option<RecommendedWatcher> {
    let git_dir = toplevel.join(".git");
    if !git_dir.is_dir() {
        debug!("No .git directory under {}, not watching", toplevel.display());
        return None;
    }

    let paths = GitPaths::new(&git_dir);
    let mut watcher = match notify::recommended_watcher(move |event: Result<notify::Event, _>| {
        let Ok(event) = event else { return };
        if let Some(kind) = paths.classify(&event.paths) {
            let _ = sender.try_send(kind);
        }
    }) {
        Ok(watcher) => watcher,
        Err(err) => {
            warn!("Failed to create git watcher: {err}");
            return None;
        },
    };

    // Git replaces `index` and `HEAD` by renaming a lock file over them, which drops a
    // watch held on the file itself. Watch the directory that contains them instead.
    for (path, mode) in [
        (git_dir.clone(), RecursiveMode::NonRecursive),
        (git_dir.join("refs"), RecursiveMode::Recursive),
    ] {
        if let Err(err) = watcher.watch(&path, mode) {
            debug!("Not watching {}: {err}", path.display());
        }
    }

    Some(watcher)
}

struct GitPaths {
    index: PathBuf,
    head: PathBuf,
    refs: PathBuf,
}

impl GitPaths {
    fn new(git_dir: &Path) -> Self {
        Self {
            index: git_dir.join("index"),
            head: git_dir.join("HEAD"),
            refs: git_dir.join("refs"),
        }
    }

    fn classify(&self, paths: &[PathBuf]) -> Option<GitChangeKind> {
        for path in paths {
            if path.starts_with(&self.refs) || *path == self.head {
                return Some(GitChangeKind::Head);
            }
            if *path == self.index {
                return Some(GitChangeKind::Index);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_git_paths() {
        let paths = GitPaths::new(Path::new("/r/.git"));
        let classify = |p: &str| paths.classify(&[PathBuf::from(p)]);

        assert_eq!(classify("/r/.git/index"), Some(GitChangeKind::Index));
        assert_eq!(classify("/r/.git/HEAD"), Some(GitChangeKind::Head));
        assert_eq!(classify("/r/.git/refs/heads/main"), Some(GitChangeKind::Head));
        assert_eq!(classify("/r/.git/index.lock"), None);
        assert_eq!(classify("/r/src/main.rs"), None);
    }

    #[test]
    fn no_git_dir_means_no_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = smol::channel::unbounded();
        assert!(start_watching(dir.path(), tx).is_none());
    }
}
