//! Submodule drift and dirtiness.
//!
//! `git submodule status` reports each submodule's checkout relative to the commit recorded
//! in the superproject. [`scan`] combines that with a nested `status --porcelain` in every
//! initialized checkout and keeps the submodules that have moved or have local changes.

use crate::{
    repo::{Repo, RepoError},
    status::{parse_porcelain, StatusCode},
};
use rustc_hash::FxHasher;
use std::{
    collections::BTreeMap,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeadStatus {
    /// Checkout matches the recorded commit.
    Unchanged,
    /// Checkout is at a different commit than the one recorded (`+`).
    HeadDiffers,
    /// Not checked out (`-`).
    Uninitialized,
    /// Merge conflict on the gitlink (`U`).
    Conflicted,
}

impl HeadStatus {
    fn from_marker(marker: char) -> Option<Self> {
        match marker {
            ' ' => Some(Self::Unchanged),
            '+' => Some(Self::HeadDiffers),
            '-' => Some(Self::Uninitialized),
            'U' => Some(Self::Conflicted),
            _ => None,
        }
    }
}

/// One line of `git submodule status`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmoduleEntry {
    /// Relative to the superproject's top level.
    pub path: PathBuf,
    pub head_status: HeadStatus,
    pub sha: String,
    /// The `(describe)` suffix, when git printed one.
    pub describe: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmoduleInfo {
    pub path: PathBuf,
    pub head_status: HeadStatus,
    pub sha: String,
    pub is_dirty: bool,
    /// Changed files inside the submodule, keyed by absolute path.
    pub changed_files: BTreeMap<PathBuf, StatusCode>,
}

/// Parse `git submodule status` output. Lines that do not fit `[ +-U]<sha> <path>` are
/// skipped.
pub fn parse_submodule_status(output: &str) -> Vec<SubmoduleEntry> {
    let mut entries = Vec::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut chars = line.chars();
        let Some(head_status) = chars.next().and_then(HeadStatus::from_marker) else {
            continue;
        };

        let rest = chars.as_str().trim();
        let Some((sha, rest)) = rest.split_once(' ') else {
            continue;
        };
        let rest = rest.trim();
        let (path, describe) = match rest.rsplit_once(" (") {
            Some((path, describe)) if describe.ends_with(')') => (
                path,
                Some(describe.trim_end_matches(')').to_string()),
            ),
            _ => (rest, None),
        };
        if path.is_empty() {
            continue;
        }

        entries.push(SubmoduleEntry {
            path: PathBuf::from(path),
            head_status,
            sha: sha.to_string(),
            describe,
        });
    }
    entries
}

/// Submodules under `toplevel` that have drifted from their recorded commit or have local
/// changes, sorted by path.
pub async fn scan(repo: &Repo, toplevel: &Path) -> Result<Vec<SubmoduleInfo>, RepoError> {
    let superproject = repo.at(toplevel);
    let output = match superproject.submodule_status().await {
        Ok(output) => output,
        Err(RepoError::CommandFailed { stderr, .. })
            if stderr.contains("no submodule mapping found") =>
        {
            debug!("Ignoring gitlinks without .gitmodules entries: {stderr}");
            return Ok(Vec::new());
        },
        Err(err) => return Err(err),
    };

    let mut infos = Vec::new();
    for entry in parse_submodule_status(&output) {
        let checkout = toplevel.join(&entry.path);
        let changed_files = if entry.head_status == HeadStatus::Uninitialized {
            BTreeMap::new()
        } else {
            match superproject.at(&checkout).status_porcelain().await {
                Ok(porcelain) => parse_porcelain(&porcelain)
                    .into_iter()
                    .map(|(rel, status)| (checkout.join(rel), status))
                    .collect(),
                Err(err) => {
                    warn!("Failed to read status of submodule {}: {err}", entry.path.display());
                    BTreeMap::new()
                },
            }
        };

        let is_dirty = !changed_files.is_empty();
        if entry.head_status != HeadStatus::HeadDiffers && !is_dirty {
            continue;
        }

        infos.push(SubmoduleInfo {
            path: entry.path,
            head_status: entry.head_status,
            sha: entry.sha,
            is_dirty,
            changed_files,
        });
    }

    infos.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(infos)
}

/// Hash of a submodule listing that does not depend on input order.
pub fn hash_submodules(infos: &[SubmoduleInfo]) -> u64 {
    let mut sorted: Vec<&SubmoduleInfo> = infos.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = FxHasher::default();
    for info in sorted {
        info.path.hash(&mut hasher);
        info.head_status.hash(&mut hasher);
        info.sha.hash(&mut hasher);
        info.is_dirty.hash(&mut hasher);
        info.changed_files.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedRunner;
    use std::sync::Arc;

    const STATUS: &str = " 1111111111111111111111111111111111111111 libs/clean (v1.0)\n\
                          +2222222222222222222222222222222222222222 libs/moved (v1.0-3-g2222222)\n\
                          -3333333333333333333333333333333333333333 libs/absent\n\
                          U4444444444444444444444444444444444444444 libs/conflict\n";

    #[test]
    fn parses_markers_and_describe() {
        let entries = parse_submodule_status(STATUS);
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].head_status, HeadStatus::Unchanged);
        assert_eq!(entries[0].path, PathBuf::from("libs/clean"));
        assert_eq!(entries[0].describe.as_deref(), Some("v1.0"));
        assert_eq!(entries[1].head_status, HeadStatus::HeadDiffers);
        assert_eq!(entries[2].head_status, HeadStatus::Uninitialized);
        assert_eq!(entries[2].describe, None);
        assert_eq!(entries[3].head_status, HeadStatus::Conflicted);
        assert_eq!(entries[3].sha, "4".repeat(40));
    }

    #[test]
    fn scan_keeps_moved_or_dirty() {
        let runner = Arc::new(ScriptedRunner::new("/repo"));
        runner.respond("submodule status", STATUS);
        let porcelain = "status --porcelain --untracked-files=all";
        runner.respond_in(Path::new("/repo/libs/clean"), porcelain, " M src/lib.rs\n");
        runner.respond_in(Path::new("/repo/libs/moved"), porcelain, "");
        runner.respond_in(Path::new("/repo/libs/conflict"), porcelain, "");
        let repo = Repo::new("/repo", runner.clone());

        let infos = smol::block_on(scan(&repo, Path::new("/repo"))).unwrap();
        let paths: Vec<_> = infos.iter().map(|i| i.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("libs/clean"), PathBuf::from("libs/moved")]);

        assert!(infos[0].is_dirty);
        assert_eq!(
            infos[0].changed_files.get(Path::new("/repo/libs/clean/src/lib.rs")),
            Some(&StatusCode::Modified)
        );
        assert!(!infos[1].is_dirty);
        assert_eq!(runner.call_count(porcelain), 3);
    }

    #[test]
    fn missing_mapping_is_empty() {
        let runner = Arc::new(ScriptedRunner::new("/repo"));
        runner.fail(
            "submodule status",
            128,
            "fatal: no submodule mapping found in .gitmodules for path 'vendor/x'",
        );
        let repo = Repo::new("/repo", runner);
        assert!(smol::block_on(scan(&repo, Path::new("/repo"))).unwrap().is_empty());
    }

    #[test]
    fn hash_ignores_order() {
        let info = |path: &str, dirty: bool| SubmoduleInfo {
            path: PathBuf::from(path),
            head_status: HeadStatus::HeadDiffers,
            sha: "abc".into(),
            is_dirty: dirty,
            changed_files: BTreeMap::new(),
        };
        let a = vec![info("a", false), info("b", true), info("c", false)];
        let b = vec![info("c", false), info("a", false), info("b", true)];
        assert_eq!(hash_submodules(&a), hash_submodules(&b));

        let c = vec![info("a", false), info("b", false), info("c", false)];
        assert_ne!(hash_submodules(&a), hash_submodules(&c));
    }
}
