//! Subprocess execution for git commands.
//!
//! The [`GitRunner`] trait is the injection seam between the rest of the crate and the
//! `git` executable: production code uses [`GitCli`], tests use
//! [`ScriptedRunner`](crate::test_support::ScriptedRunner) so that parsing, tree building and
//! change detection can be exercised without a repository on disk.
//!
//! Two calling conventions are supported:
//!
//! - `runner.run(cwd, args).await` suspends the calling task until the command exits.
//! - [`run_with_callback`] spawns the command on the smol executor and hands the result to a
//!   completion callback, returning immediately.
//!
//! A non-zero exit status is not an error at this layer. Callers decide which exit codes
//! mean "no differences", "path absent" or failure; only a failure to spawn the process is
//! reported as [`ProcessError`].

use async_trait::async_trait;
use smol::process::{Command, Stdio};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to run {program} {args}: {source}")]
    Spawn {
        program: String,
        args: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured result of one finished command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// First non-empty stderr line, for user-facing messages.
    pub fn stderr_summary(&self) -> String {
        self.stderr
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("(no output)")
            .to_string()
    }
}

/// Runs git with a working directory and argument list.
#[async_trait]
pub trait GitRunner: Send + Sync {
    async fn run(&self, cwd: &Path, args: &[String]) -> Result<CommandOutput, ProcessError>;
}

/// [`GitRunner`] backed by the `git` executable.
#[derive(Clone, Debug)]
pub struct GitCli {
    program: PathBuf,
}

impl GitCli {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitRunner for GitCli {
    async fn run(&self, cwd: &Path, args: &[String]) -> Result<CommandOutput, ProcessError> {
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            // Read-only queries never take the index lock.
            .env("GIT_OPTIONAL_LOCKS", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ProcessError::Spawn {
                program: self.program.display().to_string(),
                args: args.join(" "),
                source,
            })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };

        debug!(
            "git {} in {} exited with {:?}",
            args.join(" "),
            cwd.display(),
            result.exit_code
        );

        Ok(result)
    }
}

/// Run a command on the smol executor and deliver the result to `on_done`.
///
/// Returns immediately. There is no cancellation: the callback runs even if the caller has
/// gone away, so it must check that its target is still valid before applying anything.
pub fn run_with_callback<F>(
    runner: Arc<dyn GitRunner>,
    cwd: PathBuf,
    args: Vec<String>,
    on_done: F,
) where
    F: FnOnce(Result<CommandOutput, ProcessError>) + Send + 'static,
{
    smol::spawn(async move {
        let result = runner.run(&cwd, &args).await;
        on_done(result);
    })
    .detach();
}

/// Owned argument list from string slices.
pub fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|arg| arg.to_string()).collect()
}
