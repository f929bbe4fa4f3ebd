//! Hunk-level stage, unstage and revert.
//!
//! Each action reads the file's zero-context patch, rejects binary diffs before anything is
//! extracted, picks the hunk under the cursor, rebuilds it as a standalone patch and hands
//! it to `git apply`:
//!
//! | action  | source patch               | apply flags         |
//! |---------|----------------------------|---------------------|
//! | stage   | `diff -U0 -- <path>`       | `--cached`          |
//! | unstage | `diff -U0 --cached -- <path>` | `--cached -R`    |
//! | revert  | `diff -U0 -- <path>`       | `-R`                |

use crate::{
    diff::{
        apply::{apply_patch, ApplyError, ApplyMode},
        hunk::{hunk_starts, Hunk},
        patch::{is_binary_patch, pick_hunk_for_cursor, FilePatch, PatchError, SingleHunkPatch},
    },
    repo::{Repo, RepoError},
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum HunkActionError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("No hunk at line {line}")]
    NoHunkAtCursor { line: u32 },

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("{} is not inside the repository", path.display())]
    OutsideRepo { path: PathBuf },
}

/// A file resolved against the repository it belongs to.
struct Target {
    git: Repo,
    rel_path: PathBuf,
}

async fn resolve_target(repo: &Repo, path: &Path) -> Result<Target, HunkActionError> {
    let toplevel = repo.toplevel().await?;
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        repo.root().join(path)
    };
    let absolute = smol::unblock(move || canonicalize_existing(absolute)).await;

    let rel_path = absolute
        .strip_prefix(&toplevel)
        .map_err(|_| HunkActionError::OutsideRepo {
            path: absolute.clone(),
        })?
        .to_path_buf();

    Ok(Target {
        git: repo.at(toplevel),
        rel_path,
    })
}

/// Canonicalize the parent directory, so a deleted file still resolves.
fn canonicalize_existing(path: PathBuf) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|parent| parent.join(name))
            .unwrap_or(path),
        _ => path,
    }
}

/// Parsed patch for `target`, with binary diffs and empty patches rejected.
async fn read_patch(target: &Target, cached: bool) -> Result<FilePatch, HunkActionError> {
    let text = target.git.file_patch(&target.rel_path, cached).await?;
    if is_binary_patch(&text) {
        return Err(PatchError::Binary {
            path: target.rel_path.clone(),
        }
        .into());
    }

    let patch = FilePatch::parse(&text);
    if patch.hunks.is_empty() {
        return Err(PatchError::NoHunks {
            path: target.rel_path.clone(),
        }
        .into());
    }
    Ok(patch)
}

/// Apply the hunk under the 1-based cursor `line` of `path`.
pub async fn apply_hunk_at(
    repo: &Repo,
    path: &Path,
    line: u32,
    mode: ApplyMode,
) -> Result<(), HunkActionError> {
    let target = resolve_target(repo, path).await?;
    let patch = read_patch(&target, mode.reads_index()).await?;

    let idx = pick_hunk_for_cursor(&patch.hunks, line)
        .ok_or(HunkActionError::NoHunkAtCursor { line })?;
    let hunk = &patch.hunks[idx];
    debug!(
        "Selected hunk {} of {} ({}) for line {line}",
        idx + 1,
        patch.hunks.len(),
        hunk.header
    );

    let single = SingleHunkPatch::build(&target.rel_path, &patch, hunk)?;
    apply_patch(&target.git, &single, mode).await?;

    info!(
        "{} hunk at {}:{line}",
        match mode {
            ApplyMode::Stage => "Staged",
            ApplyMode::Unstage => "Unstaged",
            ApplyMode::Revert => "Reverted",
        },
        target.rel_path.display()
    );
    Ok(())
}

pub async fn stage_hunk(repo: &Repo, path: &Path, line: u32) -> Result<(), HunkActionError> {
    apply_hunk_at(repo, path, line, ApplyMode::Stage).await
}

pub async fn unstage_hunk(repo: &Repo, path: &Path, line: u32) -> Result<(), HunkActionError> {
    apply_hunk_at(repo, path, line, ApplyMode::Unstage).await
}

pub async fn revert_hunk(repo: &Repo, path: &Path, line: u32) -> Result<(), HunkActionError> {
    apply_hunk_at(repo, path, line, ApplyMode::Revert).await
}

/// Unstaged hunks of `path` (working tree vs index). A clean file has none.
pub async fn unstaged_hunks(repo: &Repo, path: &Path) -> Result<Vec<Hunk>, HunkActionError> {
    let target = resolve_target(repo, path).await?;
    let text = target.git.file_patch(&target.rel_path, false).await?;
    if is_binary_patch(&text) {
        return Ok(Vec::new());
    }
    Ok(FilePatch::parse(&text).hunks)
}

/// Hunk-start lines for a renderer, from the unstaged diff of `path`.
pub async fn hunk_starts_for(repo: &Repo, path: &Path) -> Result<Vec<u32>, HunkActionError> {
    Ok(hunk_starts(&unstaged_hunks(repo, path).await?))
}

/// Hunks between `path` at `reference` and unsaved buffer `text`.
///
/// `path` is resolved like the hunk actions resolve it, so a repository opened on a
/// subdirectory still finds the blob at `reference`.
pub async fn live_hunks(
    repo: &Repo,
    reference: &str,
    path: &Path,
    text: &str,
) -> Result<Vec<Hunk>, HunkActionError> {
    let target = resolve_target(repo, path).await?;
    Ok(target
        .git
        .diff_text_against_ref(reference, &target.rel_path, text)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{process::CommandOutput, test_support::ScriptedRunner};
    use std::sync::Arc;

    const TWO_HUNKS: &str = "diff --git a/f.txt b/f.txt\n\
                             index 1111111..2222222 100644\n\
                             --- a/f.txt\n\
                             +++ b/f.txt\n\
                             @@ -1,2 +1,2 @@\n\
                             -a\n\
                             -b\n\
                             +A\n\
                             +B\n\
                             @@ -6 +6,3 @@\n\
                             -f\n\
                             +F\n\
                             +G\n\
                             +H\n";

    fn scripted() -> Arc<ScriptedRunner> {
        let runner = Arc::new(ScriptedRunner::new("/repo"));
        runner.respond("diff -U0 -- f.txt", TWO_HUNKS);
        runner.respond("diff -U0 --cached -- f.txt", TWO_HUNKS);
        runner.respond_prefix("apply ", CommandOutput::ok(""));
        runner
    }

    fn applied(runner: &ScriptedRunner) -> Vec<String> {
        runner
            .calls()
            .into_iter()
            .filter(|call| call.starts_with("apply "))
            .collect()
    }

    #[test]
    fn stage_targets_hunk_under_cursor() {
        let runner = scripted();
        let repo = Repo::new("/repo", runner.clone());
        smol::block_on(stage_hunk(&repo, Path::new("/repo/f.txt"), 7)).unwrap();

        let calls = applied(&runner);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("apply --unidiff-zero --whitespace=nowarn --cached /"));
    }

    #[test]
    fn unstage_reads_cached_patch() {
        let runner = scripted();
        let repo = Repo::new("/repo", runner.clone());
        smol::block_on(unstage_hunk(&repo, Path::new("f.txt"), 1)).unwrap();

        assert_eq!(runner.call_count("diff -U0 --cached -- f.txt"), 1);
        assert!(applied(&runner)[0].contains("--cached -R "));
    }

    #[test]
    fn revert_reverses_into_worktree() {
        let runner = scripted();
        let repo = Repo::new("/repo", runner.clone());
        smol::block_on(revert_hunk(&repo, Path::new("f.txt"), 2)).unwrap();

        let call = &applied(&runner)[0];
        assert!(call.contains("--whitespace=nowarn -R "));
        assert!(!call.contains("--cached"));
    }

    #[test]
    fn binary_is_rejected_before_apply() {
        let runner = Arc::new(ScriptedRunner::new("/repo"));
        runner.respond(
            "diff -U0 -- logo.png",
            "diff --git a/logo.png b/logo.png\nBinary files a/logo.png and b/logo.png differ\n",
        );
        runner.respond_prefix("apply ", CommandOutput::ok(""));
        let repo = Repo::new("/repo", runner.clone());

        let err = smol::block_on(stage_hunk(&repo, Path::new("logo.png"), 1)).unwrap_err();
        assert!(matches!(err, HunkActionError::Patch(PatchError::Binary { .. })));
        assert!(err.to_string().contains("binary files are not supported"));
        assert!(applied(&runner).is_empty());
    }

    #[test]
    fn clean_file_has_no_hunks() {
        let runner = Arc::new(ScriptedRunner::new("/repo"));
        runner.respond("diff -U0 -- clean.rs", "");
        let repo = Repo::new("/repo", runner.clone());

        let err = smol::block_on(revert_hunk(&repo, Path::new("clean.rs"), 3)).unwrap_err();
        assert!(matches!(err, HunkActionError::Patch(PatchError::NoHunks { .. })));
    }

    #[test]
    fn apply_failure_is_reported() {
        let runner = Arc::new(ScriptedRunner::new("/repo"));
        runner.respond("diff -U0 -- f.txt", TWO_HUNKS);
        runner.respond_prefix(
            "apply ",
            CommandOutput::failed(
                1,
                "error: patch failed: f.txt:6\nerror: f.txt: patch does not apply\n",
            ),
        );
        let repo = Repo::new("/repo", runner.clone());

        let err = smol::block_on(stage_hunk(&repo, Path::new("f.txt"), 6)).unwrap_err();
        assert_eq!(err.to_string(), "Failed to stage hunk: error: patch failed: f.txt:6");
    }

    #[test]
    fn path_outside_repo() {
        let runner = scripted();
        let repo = Repo::new("/repo", runner);
        let err = smol::block_on(stage_hunk(&repo, Path::new("/elsewhere/f.txt"), 1)).unwrap_err();
        assert!(matches!(err, HunkActionError::OutsideRepo { .. }));
    }

    #[test]
    fn hunk_starts_from_unstaged_diff() {
        let runner = scripted();
        let repo = Repo::new("/repo", runner);
        let starts = smol::block_on(hunk_starts_for(&repo, Path::new("f.txt"))).unwrap();
        assert_eq!(starts, vec![1, 6]);
    }

    #[test]
    fn live_hunks_use_toplevel_relative_path() {
        let runner = Arc::new(ScriptedRunner::new("/repo"));
        runner.respond("show HEAD:sub/inner.txt", "a\nb\n");
        runner.respond_prefix(
            "diff --no-index ",
            CommandOutput {
                stdout: "@@ -2 +2 @@\n-b\n+B\n".into(),
                exit_code: Some(1),
                ..Default::default()
            },
        );
        let repo = Repo::new("/repo/sub", runner.clone());

        let hunks =
            smol::block_on(live_hunks(&repo, "HEAD", Path::new("inner.txt"), "a\nB\n")).unwrap();
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].lines, vec!["-b", "+B"]);
        assert_eq!(runner.call_count("show HEAD:sub/inner.txt"), 1);
        assert_eq!(runner.call_count("show HEAD:inner.txt"), 0);
    }
}
