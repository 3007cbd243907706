//! Configuration file (`.beads/skein.yaml`).
//!
//! Every field has a default, so an empty or partial file is valid.

use crate::error::Result;
use crate::sync::ConflictStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Directory holding the store and configuration
pub const BEADS_DIR_NAME: &str = ".beads";

/// Configuration file name inside [`BEADS_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "skein.yaml";

/// Primary store file name
pub const ISSUES_FILE_NAME: &str = "issues.jsonl";

/// Default issue ID prefix
pub const DEFAULT_PREFIX: &str = "bd";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct SkeinConfig {
    /// Issue ID prefix (e.g. "bd" for "bd-a1b2")
    pub issue_prefix: String,

    /// Watcher and sync settings
    pub sync: SyncConfig,

    /// GitHub reconciliation settings
    pub github: GitHubConfig,
}

impl Default for SkeinConfig {
    fn default() -> Self {
        Self {
            issue_prefix: DEFAULT_PREFIX.to_string(),
            sync: SyncConfig::default(),
            github: GitHubConfig::default(),
        }
    }
}

impl SkeinConfig {
    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Config`
    /// if it is not valid YAML for this schema.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load `path` if it exists, otherwise the defaults.
    ///
    /// # Errors
    ///
    /// Same as [`SkeinConfig::load`] for an existing file.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if fs::try_exists(path).await? {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` on serialization failure and `Error::Io` if
    /// the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Resolve relative paths against `root` (the directory containing
    /// `.beads`).
    #[must_use]
    pub fn rooted_at(mut self, root: &Path) -> Self {
        if self.sync.watch_dir.is_relative() {
            self.sync.watch_dir = root.join(&self.sync.watch_dir);
        }
        self
    }
}

/// Walk up from `start` looking for a directory containing `.beads`.
#[must_use]
pub fn find_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(BEADS_DIR_NAME).is_dir())
        .map(Path::to_path_buf)
}

/// Watcher and sync settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct SyncConfig {
    /// Tracked directory
    pub watch_dir: PathBuf,

    /// Primary store file inside the tracked directory
    pub issues_file: String,

    /// Tracked file extension, without the dot
    pub extension: String,

    /// Quiet period before a rescan, in milliseconds
    pub debounce_ms: u64,

    /// Run sync passes on a timer while watching
    pub auto_sync: bool,

    /// Auto-sync period, in milliseconds
    pub sync_interval_ms: u64,

    /// Strategy applied as soon as a conflict is detected
    pub conflict_strategy: ConflictStrategy,

    /// Retries for transient publish failures
    pub max_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from(BEADS_DIR_NAME),
            issues_file: ISSUES_FILE_NAME.to_string(),
            extension: "jsonl".to_string(),
            debounce_ms: 500,
            auto_sync: false,
            sync_interval_ms: 30_000,
            conflict_strategy: ConflictStrategy::Manual,
            max_retries: 3,
        }
    }
}

impl SyncConfig {
    /// Settings for a specific directory, defaults otherwise.
    pub fn for_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            watch_dir: dir.into(),
            ..Self::default()
        }
    }

    /// Debounce window.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Auto-sync period, or `None` when auto-sync is off.
    #[must_use]
    pub fn auto_sync_interval(&self) -> Option<Duration> {
        (self.auto_sync && self.sync_interval_ms > 0)
            .then(|| Duration::from_millis(self.sync_interval_ms))
    }
}

/// GitHub reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// `owner/name`; detected with `gh repo view` when absent
    pub repo: Option<String>,

    /// Prefix of priority labels
    pub priority_prefix: String,

    /// Prefix of type labels
    pub type_prefix: String,

    /// Per-call timeout for `gh`, in milliseconds
    pub timeout_ms: u64,

    /// Retries for transient `gh` failures
    pub max_retries: u32,

    /// Maximum issues fetched when pulling
    pub list_limit: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            repo: None,
            priority_prefix: "priority:".to_string(),
            type_prefix: "type:".to_string(),
            timeout_ms: 30_000,
            max_retries: 3,
            list_limit: 100,
        }
    }
}

impl GitHubConfig {
    /// Per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: SkeinConfig = serde_yaml::from_str(
            "issue-prefix: proj\nsync:\n  debounce-ms: 50\n  conflict-strategy: most-recent\n",
        )
        .unwrap();
        assert_eq!(config.issue_prefix, "proj");
        assert_eq!(config.sync.debounce_ms, 50);
        assert_eq!(config.sync.conflict_strategy, ConflictStrategy::MostRecent);
        assert_eq!(config.sync.extension, "jsonl");
        assert_eq!(config.github.priority_prefix, "priority:");
    }

    #[test]
    fn auto_sync_interval_requires_flag() {
        let mut sync = SyncConfig::default();
        assert_eq!(sync.auto_sync_interval(), None);
        sync.auto_sync = true;
        assert_eq!(sync.auto_sync_interval(), Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = SkeinConfig::default();
        config.github.repo = Some("octo/widgets".to_string());

        config.save(&path).await.unwrap();
        assert_eq!(SkeinConfig::load(&path).await.unwrap(), config);
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = SkeinConfig::load_or_default(&dir.path().join("nope.yaml"))
            .await
            .unwrap();
        assert_eq!(config, SkeinConfig::default());
    }

    #[test]
    fn find_root_walks_up() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(BEADS_DIR_NAME)).unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_root(&nested).as_deref(), Some(dir.path()));
    }
}
