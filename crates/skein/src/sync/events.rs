//! Events broadcast by the sync manager.

use super::change::{ChangeRecord, ConflictRecord};
use super::manager::SyncReport;
use std::path::PathBuf;

/// Lifecycle, sync, and change notifications.
///
/// Delivered through a `tokio::sync::broadcast` channel; slow subscribers
/// may observe `RecvError::Lagged` and miss events.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The directory watch is attached
    WatcherStarted {
        /// Watched directory
        dir: PathBuf,
    },
    /// The directory watch is detached
    WatcherStopped,
    /// The watch could not be attached or failed later
    WatcherError {
        /// Failure description
        message: String,
    },
    /// A sync pass began
    SyncStarted,
    /// A sync pass finished without item errors
    SyncCompleted(SyncReport),
    /// A conflict is waiting for manual resolution
    SyncConflict(ConflictRecord),
    /// A sync pass finished with item errors
    SyncError(SyncReport),
    /// A local change was recorded
    ChangeLocal(ChangeRecord),
    /// A remote change was recorded
    ChangeRemote(ChangeRecord),
    /// A remote change was written to disk
    ChangeMerged(ChangeRecord),
}

impl SyncEvent {
    /// Stable event name, e.g. `sync:started`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::WatcherStarted { .. } => "watcher:started",
            Self::WatcherStopped => "watcher:stopped",
            Self::WatcherError { .. } => "watcher:error",
            Self::SyncStarted => "sync:started",
            Self::SyncCompleted(_) => "sync:completed",
            Self::SyncConflict(_) => "sync:conflict",
            Self::SyncError(_) => "sync:error",
            Self::ChangeLocal(_) => "change:local",
            Self::ChangeRemote(_) => "change:remote",
            Self::ChangeMerged(_) => "change:merged",
        }
    }
}
