//! Session configuration, loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all, via
//! [`Config::default`]) is a valid configuration. Unknown keys are rejected.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{path::Path, time::Duration};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Milliseconds between change-detector polls.
    pub poll_interval_ms: u64,

    /// Include submodule drift and dirtiness in polling and tree builds.
    pub watch_submodules: bool,

    /// Also wake the change detector on `.git/index`, `.git/HEAD` and `.git/refs` events.
    pub watch_git_dir: bool,

    /// Populate trees from changed paths only, rather than scanning the whole directory.
    pub diff_only: bool,

    /// Reference the working view is compared against.
    pub base_ref: String,

    /// Executable used for every git command.
    pub git_program: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            watch_submodules: true,
            watch_git_dir: false,
            diff_only: true,
            base_ref: "HEAD".to_string(),
            git_program: "git".to_string(),
        }
    }
}

impl Config {
    /// Read and deserialize a TOML config file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_is_default() {
        let tmp_dir = tempdir().unwrap();
        let config_path = tmp_dir.path().join("gitree.toml");
        std::fs::write(&config_path, "# nothing here\n").unwrap();

        assert_eq!(Config::load(&config_path).unwrap(), Config::default());
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert!(config.watch_submodules);
        assert!(!config.watch_git_dir);
        assert!(config.diff_only);
        assert_eq!(config.base_ref, "HEAD");
        assert_eq!(config.git_program, "git");
    }

    #[test]
    fn partial_override() {
        let tmp_dir = tempdir().unwrap();
        let config_path = tmp_dir.path().join("gitree.toml");
        std::fs::write(&config_path, "poll_interval_ms = 500\nbase_ref = \"main\"\n").unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.base_ref, "main");
        assert!(config.diff_only);
    }

    #[test]
    fn errors_on_unknown_key() {
        let tmp_dir = tempdir().unwrap();
        let config_path = tmp_dir.path().join("gitree.toml");
        std::fs::write(&config_path, "poll_interval = 5\n").unwrap();

        let err = Config::load(&config_path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn errors_on_nonexistent_file() {
        let tmp_dir = tempdir().unwrap();
        let result = Config::load(&tmp_dir.path().join("nonexistent.toml"));
        assert!(result.unwrap_err().to_string().contains("Failed to read"));
    }
}
