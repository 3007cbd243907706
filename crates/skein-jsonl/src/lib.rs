//! JSONL (JSON Lines) support for skein issue stores.
//!
//! Each issue store file holds one JSON object per line. This crate provides
//! the pieces the store needs around that format:
//!
//! - [`JsonlReader`]: line-numbered async reading of typed records
//! - [`read_jsonl_resilient`]: whole-file loading that skips bad lines and
//!   reports them as [`Warning`]s instead of failing
//! - [`JsonlWriter`]: buffered async writing of records
//! - [`write_jsonl_atomic`]: crash-safe temp-file-then-rename persistence
//! - [`write_lines_atomic`]: the same, for lines that are already text

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod atomic;
pub mod error;
pub mod reader;
pub mod warning;
pub mod writer;

pub use atomic::{write_jsonl_atomic, write_jsonl_atomic_iter, write_lines_atomic};
pub use error::{Error, Result};
pub use reader::{read_jsonl_resilient, JsonlReader};
pub use warning::Warning;
pub use writer::JsonlWriter;
