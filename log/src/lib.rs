//! Logging setup for gitree with file output and optional stdout.
//!
//! Logs always go to a file at `warn` level (or the user-selected level when a filter
//! environment variable is set). Stdout logging is enabled when `GITREE_LOG` or `RUST_LOG`
//! is set, or in debug builds.
//!
//! ## Environment Variables
//!
//! 1. **`GITREE_LOG`** (highest priority) - gitree-specific logging control
//! 2. **`RUST_LOG`** - Standard tracing environment variable
//! 3. **Default** - `warn` globally, `info` for gitree crates
//!
//! ## Log File Location
//!
//! Default: `<data_local_dir>/gitree/logs/gitree-<pid>.log`
//! - macOS: `~/Library/Application Support/gitree/logs/gitree-12345.log`
//! - Linux: `~/.local/share/gitree/logs/gitree-12345.log`
//!
//! Override with [`LogConfig::log_file_path`].

use std::{
    env,
    path::{Path, PathBuf},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Crates whose level follows a bare `GITREE_LOG=<level>`.
const GITREE_CRATES: &[&str] = &["gitree", "gitree_log", "git_fixture"];

/// Returned from [`init`]; must be held alive to ensure log file flushing.
pub struct LogGuard {
    _file_guard: WorkerGuard,
    pub log_file: PathBuf,
}

#[derive(Debug, Default)]
pub struct LogConfig {
    /// A file path (with extension) or a directory to place the default file name in.
    pub log_file_path: Option<PathBuf>,
}

/// Initialize logging.
///
/// Filter priority is `GITREE_LOG` > `RUST_LOG` > defaults, see the module docs.
///
/// The returned [`LogGuard`] must be held for the lifetime of the program --
/// dropping it flushes and stops the background file writer.
pub fn init(config: LogConfig) -> Result<LogGuard, Box<dyn std::error::Error + Send + Sync>> {
    let (log_dir, filename) = resolve_log_path(config.log_file_path);

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(&log_dir, &filename);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_filter(create_file_filter());

    let stdout_enabled =
        env::var("GITREE_LOG").is_ok() || env::var("RUST_LOG").is_ok() || cfg!(debug_assertions);

    let stdout_layer = if stdout_enabled {
        Some(fmt::layer().with_filter(create_filter()))
    } else {
        None
    };

    Registry::default()
        .with(file_layer)
        .with(stdout_layer)
        .try_init()?;

    Ok(LogGuard {
        _file_guard: file_guard,
        log_file: log_dir.join(filename),
    })
}

/// Initialize logging for tests.
///
/// Stdout-only, with the test writer so output is captured per test. Safe to call from
/// every test; only the first call installs a subscriber.
pub fn test() {
    let _ = fmt()
        .with_env_filter(create_filter())
        .with_test_writer()
        .try_init();
}

fn resolve_log_path(override_path: Option<PathBuf>) -> (PathBuf, String) {
    let filename = format!("gitree-{}.log", std::process::id());

    if let Some(path) = override_path {
        if path.extension().is_some() {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(filename);
            return (dir.to_path_buf(), name);
        }
        return (path, filename);
    }

    let dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gitree")
        .join("logs");

    (dir, filename)
}

/// File filter: uses the user-specified level if set, otherwise `warn`.
fn create_file_filter() -> EnvFilter {
    if env::var("GITREE_LOG").is_ok() || env::var("RUST_LOG").is_ok() {
        return create_filter();
    }
    EnvFilter::new("warn")
}

fn create_filter() -> EnvFilter {
    if let Ok(gitree_log) = env::var("GITREE_LOG") {
        return expand_gitree_log(&gitree_log);
    }

    if let Ok(rust_log) = env::var("RUST_LOG") {
        return EnvFilter::new(rust_log);
    }

    EnvFilter::new(default_directives())
}

fn default_directives() -> String {
    directives_for("info")
}

fn directives_for(level: &str) -> String {
    let mut directives = String::from("warn");
    for krate in GITREE_CRATES {
        directives.push_str(&format!(",{krate}={level}"));
    }
    directives
}

/// Expand `GITREE_LOG` values into full tracing filter strings.
///
/// - `GITREE_LOG=debug` becomes `warn,gitree=debug,gitree_log=debug,...`
/// - `GITREE_LOG=gitree::detector=trace` is used as-is
fn expand_gitree_log(value: &str) -> EnvFilter {
    EnvFilter::new(expand_directives(value))
}

fn expand_directives(value: &str) -> String {
    if value.contains('=') || value.contains(':') || value.contains(',') {
        return value.to_string();
    }
    directives_for(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_expands_to_all_crates() {
        assert_eq!(
            expand_directives("debug"),
            "warn,gitree=debug,gitree_log=debug,git_fixture=debug"
        );
    }

    #[test]
    fn advanced_syntax_passes_through() {
        assert_eq!(
            expand_directives("gitree::detector=trace"),
            "gitree::detector=trace"
        );
        assert_eq!(expand_directives("info,gitree=debug"), "info,gitree=debug");
    }

    #[test]
    fn default_is_info_for_gitree() {
        assert!(default_directives().starts_with("warn,gitree=info"));
    }

    #[test]
    fn explicit_file_path_splits_dir_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("custom.log");
        let (resolved_dir, name) = resolve_log_path(Some(file));
        assert_eq!(resolved_dir, dir.path());
        assert_eq!(name, "custom.log");
    }

    #[test]
    fn directory_override_keeps_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let (resolved_dir, name) = resolve_log_path(Some(dir.path().to_path_buf()));
        assert_eq!(resolved_dir, dir.path());
        assert!(name.starts_with("gitree-") && name.ends_with(".log"));
    }
}
