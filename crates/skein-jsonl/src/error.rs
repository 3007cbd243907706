//! Error types for skein-jsonl operations.

use std::io;
use thiserror::Error;

/// The error type for skein-jsonl operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred while reading or writing.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error at line {line}: {source}")]
    Json {
        /// 1-based line number of the offending record (0 when writing).
        line: usize,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid JSONL format.
    #[error("Invalid JSONL format: {0}")]
    InvalidFormat(String),
}

/// A specialized Result type for skein-jsonl operations.
pub type Result<T> = std::result::Result<T, Error>;
