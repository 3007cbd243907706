//! Color and formatting helpers for CLI output.
//!
//!   - Success: green  (completed syncs, created links)
//!   - Warning: yellow (conflicts, item failures)
//!   - Error:   red    (watcher errors, failed passes)
//!   - Info:    cyan   (task ids, issue numbers)

use crate::error::ItemSyncError;
use crate::github::GitHubLink;
use crate::sync::SyncEvent;
use colored::Colorize;
use std::env;

/// Whether to color output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Palette {
    use_colors: bool,
}

impl Palette {
    /// Colors on unless disabled by flag or `NO_COLOR`.
    pub(super) fn new(requested: bool) -> Self {
        Self {
            use_colors: requested && env::var_os("NO_COLOR").is_none(),
        }
    }

    fn paint(self, text: &str, f: impl FnOnce(&str) -> colored::ColoredString) -> String {
        if self.use_colors {
            f(text).to_string()
        } else {
            text.to_string()
        }
    }

    pub(super) fn success(self, text: &str) -> String {
        self.paint(text, |t| t.green())
    }

    pub(super) fn warning(self, text: &str) -> String {
        self.paint(text, |t| t.yellow())
    }

    pub(super) fn error(self, text: &str) -> String {
        self.paint(text, |t| t.red())
    }

    pub(super) fn info(self, text: &str) -> String {
        self.paint(text, |t| t.cyan())
    }
}

/// One line describing a sync event.
pub(super) fn event_line(event: &SyncEvent, palette: Palette) -> String {
    let name = event.name();
    match event {
        SyncEvent::WatcherStarted { dir } => {
            format!("{} watching {}", palette.success(name), dir.display())
        }
        SyncEvent::WatcherStopped | SyncEvent::SyncStarted => palette.info(name),
        SyncEvent::WatcherError { message } => format!("{} {message}", palette.error(name)),
        SyncEvent::SyncCompleted(report) => format!(
            "{} applied {} remote, published {} local, resolved {}",
            palette.success(name),
            report.applied_remote,
            report.published_local,
            report.resolved
        ),
        SyncEvent::SyncError(report) => format!(
            "{} {} item(s) failed",
            palette.error(name),
            report.errors.len()
        ),
        SyncEvent::SyncConflict(conflict) => format!(
            "{} {} changed locally ({}) and remotely ({})",
            palette.warning(name),
            palette.info(conflict.issue_id.as_str()),
            conflict.local.change_type,
            conflict.remote.change_type
        ),
        SyncEvent::ChangeLocal(change)
        | SyncEvent::ChangeRemote(change)
        | SyncEvent::ChangeMerged(change) => format!(
            "{} {} {}",
            palette.info(name),
            change.change_type,
            change.issue_id
        ),
    }
}

/// One line per link.
pub(super) fn link_line(link: &GitHubLink, palette: Palette) -> String {
    format!(
        "{}  {}#{}  {}",
        palette.info(link.task_id.as_str()),
        link.repo,
        link.issue_number,
        link.issue_url
    )
}

/// One line per failed item.
pub(super) fn item_error_line(error: &ItemSyncError, palette: Palette) -> String {
    format!("  {} {}", palette.warning(&error.item), error.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IssueId;
    use crate::sync::{ChangeRecord, ChangeSource, ChangeType};
    use std::path::PathBuf;

    #[test]
    fn plain_palette_leaves_text_alone() {
        let palette = Palette { use_colors: false };
        assert_eq!(palette.error("boom"), "boom");
    }

    #[test]
    fn event_lines_name_the_event() {
        let palette = Palette { use_colors: false };
        let started = SyncEvent::WatcherStarted {
            dir: PathBuf::from(".beads"),
        };
        assert_eq!(event_line(&started, palette), "watcher:started watching .beads");

        let change = ChangeRecord::new(IssueId::new("bd-1"), ChangeType::Delete, ChangeSource::Local);
        assert_eq!(
            event_line(&SyncEvent::ChangeLocal(change), palette),
            "change:local delete bd-1"
        );
    }
}
