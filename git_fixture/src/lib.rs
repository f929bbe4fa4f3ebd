use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};
use tempfile::TempDir;

/// Run a git command in `dir`, returning stdout on success.
pub fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("running git {}", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "git {} failed in {}:\n{stderr}",
            args.join(" "),
            dir.display()
        );
    }

    String::from_utf8(output.stdout).context("git output is not utf-8")
}

/// Init a git repo at `repo_dir` with a test identity and no signing.
pub fn init_repo(repo_dir: &Path) -> Result<()> {
    run_git(repo_dir, &["init", "-q"])?;
    run_git(repo_dir, &["config", "user.name", "Test"])?;
    run_git(repo_dir, &["config", "user.email", "test@test.com"])?;
    run_git(repo_dir, &["config", "commit.gpgsign", "false"])?;
    run_git(repo_dir, &["config", "core.autocrlf", "false"])?;
    Ok(())
}

/// Temporary git repository, built step by step by the test.
///
/// The repository lives in a [`TempDir`] that is removed on drop.
pub struct GitFixture {
    _temp_dir: TempDir,
    dir: PathBuf,
}

impl GitFixture {
    /// Create an empty repository (no commits) in a new temp dir.
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new().context("creating temp dir")?;
        let dir = fs::canonicalize(temp_dir.path()).context("canonicalizing temp dir")?;
        init_repo(&dir)?;
        Ok(Self {
            _temp_dir: temp_dir,
            dir,
        })
    }

    /// Create a repository with `files` committed as the first commit.
    pub fn with_commit(files: &[(&str, &str)], message: &str) -> Result<Self> {
        let fixture = Self::new()?;
        for (path, content) in files {
            fixture.write(path, content)?;
        }
        fixture.commit_all(message)?;
        Ok(fixture)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute path of `rel` inside the fixture.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.join(rel)
    }

    /// Write `content` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("writing {}", path.display()))
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        let path = self.path(rel);
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }

    pub fn remove(&self, rel: &str) -> Result<()> {
        let path = self.path(rel);
        fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))
    }

    pub fn stage(&self, rel: &str) -> Result<()> {
        self.git(&["add", "--", rel]).map(drop)
    }

    /// Stage everything and commit, returning the new commit id.
    pub fn commit_all(&self, message: &str) -> Result<String> {
        self.git(&["add", "-A"])?;
        self.git(&["commit", "-q", "--allow-empty", "-m", message])?;
        self.head()
    }

    pub fn head(&self) -> Result<String> {
        Ok(self.git(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    /// Content of `rel` as recorded in the index.
    pub fn index_content(&self, rel: &str) -> Result<String> {
        self.git(&["show", &format!(":{rel}")])
    }

    /// Run a git command in the fixture directory, returning stdout.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        run_git(&self.dir, args)
    }
}

#[cfg(test)]
mod tests {
    use super::GitFixture;

    #[test]
    fn with_commit_records_head() {
        let fixture = GitFixture::with_commit(&[("a.txt", "one\n")], "initial").unwrap();
        let head = fixture.head().unwrap();
        assert_eq!(head.len(), 40);

        let log = fixture.git(&["log", "--oneline"]).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("initial"));
    }

    #[test]
    fn write_creates_nested_dirs() {
        let fixture = GitFixture::new().unwrap();
        fixture.write("src/deep/file.rs", "fn main() {}\n").unwrap();
        assert_eq!(
            fixture.read("src/deep/file.rs").unwrap(),
            "fn main() {}\n"
        );
    }

    #[test]
    fn index_content_tracks_staging() {
        let fixture = GitFixture::with_commit(&[("a.txt", "one\n")], "initial").unwrap();
        fixture.write("a.txt", "one\ntwo\n").unwrap();
        assert_eq!(fixture.index_content("a.txt").unwrap(), "one\n");

        fixture.stage("a.txt").unwrap();
        assert_eq!(fixture.index_content("a.txt").unwrap(), "one\ntwo\n");
    }
}
