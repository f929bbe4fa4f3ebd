//! In-memory collaborators for tests.
//!
//! [`ScriptedRunner`] answers git invocations from a table keyed on the joined argument
//! list, optionally scoped to a working directory. Unscripted commands exit with 128 so a
//! missing script entry shows up as a failure rather than silently succeeding.
//! [`RecordingNotifier`] collects every notice a session emits.

use crate::{
    notify::{Notice, Notify},
    process::{CommandOutput, GitRunner, ProcessError},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

pub struct ScriptedRunner {
    responses: Mutex<FxHashMap<String, CommandOutput>>,
    scoped: Mutex<FxHashMap<(PathBuf, String), CommandOutput>>,
    prefixed: Mutex<Vec<(String, CommandOutput)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    /// A runner whose `rev-parse --show-toplevel` answers `toplevel`.
    pub fn new(toplevel: impl AsRef<Path>) -> Self {
        let runner = Self {
            responses: Mutex::default(),
            scoped: Mutex::default(),
            prefixed: Mutex::default(),
            calls: Mutex::default(),
        };
        runner.respond(
            "rev-parse --show-toplevel",
            &format!("{}\n", toplevel.as_ref().display()),
        );
        runner
    }

    /// Answer `args` with `stdout` and exit code 0.
    pub fn respond(&self, args: &str, stdout: &str) {
        self.respond_with(args, CommandOutput::ok(stdout));
    }

    pub fn respond_with(&self, args: &str, output: CommandOutput) {
        self.responses.lock().insert(args.to_string(), output);
    }

    /// Answer `args` with a non-zero exit.
    pub fn fail(&self, args: &str, code: i32, stderr: &str) {
        self.respond_with(args, CommandOutput::failed(code, stderr));
    }

    /// Answer `args` only when run in `cwd`. Takes priority over unscoped entries.
    pub fn respond_in(&self, cwd: &Path, args: &str, stdout: &str) {
        self.scoped.lock().insert(
            (cwd.to_path_buf(), args.to_string()),
            CommandOutput::ok(stdout),
        );
    }

    /// Answer any command starting with `prefix`, for arguments that vary per run (temp
    /// file paths). Exact entries take priority.
    pub fn respond_prefix(&self, prefix: &str, output: CommandOutput) {
        self.prefixed.lock().push((prefix.to_string(), output));
    }

    /// Every invocation so far, as joined argument strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, args: &str) -> usize {
        self.calls.lock().iter().filter(|call| *call == args).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl GitRunner for ScriptedRunner {
    async fn run(&self, cwd: &Path, args: &[String]) -> Result<CommandOutput, ProcessError> {
        let key = args.join(" ");
        self.calls.lock().push(key.clone());

        if let Some(output) = self.scoped.lock().get(&(cwd.to_path_buf(), key.clone())) {
            return Ok(output.clone());
        }

        if let Some(output) = self.responses.lock().get(&key) {
            return Ok(output.clone());
        }

        Ok(self
            .prefixed
            .lock()
            .iter()
            .find(|(prefix, _)| key.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::failed(128, format!("unscripted: git {key}"))))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .map(|notice| notice.message.clone())
            .collect()
    }
}

impl Notify for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
