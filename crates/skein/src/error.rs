//! Error types for skein operations.
//!
//! Errors come in two tiers:
//!
//! - **`Error`**: failures returned to the caller of an operation (missing
//!   watch directory, missing store file, unknown link, transport failure).
//! - **`ItemSyncError`**: a single issue that failed inside a batch sync. These
//!   are collected into the batch report and never abort the remaining items.

use std::fmt;
use thiserror::Error;

/// Result type for skein operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for skein operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Required configuration is missing or invalid (e.g. watched directory not found).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The OS file watch could not be attached or failed.
    #[error("watch error: {0}")]
    Watch(String),

    /// A conflict needs a caller-supplied resolution.
    #[error("conflict on {issue_id}: {message}")]
    Conflict {
        /// Issue the conflict belongs to
        issue_id: String,
        /// What is missing to resolve it
        message: String,
    },

    /// A change record is inconsistent (e.g. an update without a new state).
    #[error("invalid change: {0}")]
    InvalidChange(String),

    /// A single item failed during a batch sync.
    #[error(transparent)]
    ItemSync(#[from] ItemSyncError),

    /// A link request was rejected (malformed URL, remote issue missing).
    #[error("link validation failed: {0}")]
    LinkValidation(String),

    /// Unknown task id, issue number, link, or store file.
    #[error("{0}")]
    NotFound(String),

    /// The external tracker CLI failed, timed out, or returned an unexpected payload.
    #[error("transport error: {0}")]
    Transport(String),

    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSONL store file could not be read or written.
    #[error("store error: {0}")]
    Jsonl(#[from] skein_jsonl::Error),

    /// YAML configuration could not be parsed or written.
    #[error("config file error: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl Error {
    /// Returns `true` for failures worth retrying (transport hiccups).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Convenience constructor for a "task not found" error.
    pub fn task_not_found(task_id: impl fmt::Display) -> Self {
        Self::NotFound(format!("Task not found: {task_id}"))
    }
}

/// Category of a per-item sync failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSyncErrorKind {
    /// Local task or remote issue does not exist
    NotFound,
    /// External tracker call failed after retries
    Transport,
    /// Reading or writing the local store failed
    Store,
    /// A conflict is waiting for manual resolution
    Conflict,
}

impl fmt::Display for ItemSyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Transport => write!(f, "transport"),
            Self::Store => write!(f, "store"),
            Self::Conflict => write!(f, "conflict"),
        }
    }
}

/// Error recorded for one issue during a batch sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSyncError {
    /// Local task id or `#<number>` for a remote issue
    pub item: String,
    /// Category of the failure
    pub kind: ItemSyncErrorKind,
    /// Human-readable message
    pub message: String,
}

impl fmt::Display for ItemSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.item, self.message, self.kind)
    }
}

impl std::error::Error for ItemSyncError {}

impl ItemSyncError {
    /// Create a new item error.
    #[must_use]
    pub fn new(item: impl Into<String>, kind: ItemSyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            kind,
            message: message.into(),
        }
    }

    /// Classify an operation error for the given item.
    #[must_use]
    pub fn from_error(item: impl Into<String>, error: &Error) -> Self {
        let kind = match error {
            Error::NotFound(_) => ItemSyncErrorKind::NotFound,
            Error::Transport(_) => ItemSyncErrorKind::Transport,
            Error::Conflict { .. } => ItemSyncErrorKind::Conflict,
            Error::ItemSync(inner) => inner.kind,
            _ => ItemSyncErrorKind::Store,
        };
        Self::new(item, kind, error.to_string())
    }
}
