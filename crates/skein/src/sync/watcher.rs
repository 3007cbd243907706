//! Filesystem watch over the tracked directory.

use crate::error::{Error, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::debug;

/// What the OS watch reports to the scheduler loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WatchSignal {
    /// A tracked file changed
    Changed(PathBuf),
    /// The watch backend reported an error
    Failed(String),
}

/// Returns `true` if a change to `path` should trigger a rescan.
///
/// Only files with the tracked extension count; the `.tmp` siblings written
/// during atomic saves do not.
pub(crate) fn is_tracked_change(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Attached OS watch. Dropping it detaches the watch.
pub(crate) struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
}

impl DirectoryWatcher {
    /// Watch `dir` (non-recursively) and forward tracked changes to `tx`.
    pub(crate) fn attach(
        dir: &Path,
        extension: &str,
        tx: mpsc::UnboundedSender<WatchSignal>,
    ) -> Result<Self> {
        let extension = extension.to_string();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                for path in event.paths {
                    if is_tracked_change(&path, &extension) {
                        debug!(path = %path.display(), "Tracked file changed");
                        let _ = tx.send(WatchSignal::Changed(path));
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(WatchSignal::Failed(e.to_string()));
            }
        })
        .map_err(|e| Error::Watch(e.to_string()))?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Watch(format!("{}: {e}", dir.display())))?;

        Ok(Self { _watcher: watcher })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn only_tracked_extension_counts() {
        assert!(is_tracked_change(Path::new("/p/.beads/issues.jsonl"), "jsonl"));
        assert!(is_tracked_change(Path::new("/p/.beads/ARCHIVE.JSONL"), "jsonl"));
        assert!(!is_tracked_change(Path::new("/p/.beads/issues.jsonl.tmp"), "jsonl"));
        assert!(!is_tracked_change(Path::new("/p/.beads/config.yaml"), "jsonl"));
        assert!(!is_tracked_change(Path::new("/p/.beads/jsonl"), "jsonl"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn attached_watch_forwards_only_tracked_files() {
        let dir = tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watcher = DirectoryWatcher::attach(dir.path(), "jsonl", tx).unwrap();

        tokio::fs::write(dir.path().join("notes.txt"), "scratch").await.unwrap();
        tokio::fs::write(dir.path().join("issues.jsonl"), "{}\n").await.unwrap();

        let mut signals = Vec::new();
        while let Ok(Some(signal)) =
            tokio::time::timeout(Duration::from_millis(1_000), rx.recv()).await
        {
            signals.push(signal);
        }
        assert!(!signals.is_empty());
        for signal in signals {
            match signal {
                WatchSignal::Changed(path) => {
                    assert_eq!(path.file_name().unwrap(), "issues.jsonl");
                }
                WatchSignal::Failed(message) => panic!("watch failed: {message}"),
            }
        }
    }
}
