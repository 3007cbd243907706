//! JSONL reading operations.
//!
//! This module provides async, line-numbered reading of JSONL data, plus the
//! resilient whole-file loader used by the issue store.

use crate::error::{Error, Result};
use crate::warning::Warning;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, warn};

/// Async reader for JSONL (JSON Lines) data.
///
/// `JsonlReader` wraps an async reader in a [`BufReader`] and tracks the
/// 1-based number of the last line consumed, so parse failures can point at
/// the offending line. Blank lines are skipped.
///
/// # Examples
///
/// ```no_run
/// use skein_jsonl::JsonlReader;
/// use tokio::fs::File;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let file = File::open("issues.jsonl").await?;
/// let mut reader = JsonlReader::new(file);
/// while let Some(value) = reader.read_line::<serde_json::Value>().await? {
///     println!("{value}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct JsonlReader<R> {
    reader: BufReader<R>,
    line_number: usize,
    buf: String,
}

impl<R: AsyncRead + Unpin> JsonlReader<R> {
    /// Creates a new `JsonlReader` wrapping the given async reader.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_number: 0,
            buf: String::new(),
        }
    }

    /// Returns the 1-based number of the last line read (0 before any read).
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Advances to the next non-blank line, leaving it in the internal buffer.
    ///
    /// Returns `false` at end of input.
    async fn advance(&mut self) -> Result<bool> {
        loop {
            self.buf.clear();
            let read = self.reader.read_line(&mut self.buf).await?;
            if read == 0 {
                return Ok(false);
            }
            self.line_number += 1;
            if !self.buf.trim().is_empty() {
                return Ok(true);
            }
        }
    }

    /// Reads and deserializes the next non-blank line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] with the line number if the line does not parse
    /// as `T`, or [`Error::Io`] on read failure.
    pub async fn read_line<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        if !self.advance().await? {
            return Ok(None);
        }
        let value = serde_json::from_str(self.buf.trim()).map_err(|source| Error::Json {
            line: self.line_number,
            source,
        })?;
        Ok(Some(value))
    }

    /// Reads every remaining line, skipping bad ones.
    ///
    /// Lines that are not JSON objects, or that fail to deserialize into `T`,
    /// are reported as warnings and skipped.
    ///
    /// # Errors
    ///
    /// Only I/O failures are fatal.
    pub async fn read_all_resilient<T: DeserializeOwned>(
        &mut self,
    ) -> Result<(Vec<T>, Vec<Warning>)> {
        let mut values = Vec::new();
        let mut warnings = Vec::new();

        while self.advance().await? {
            let line_number = self.line_number;
            let raw: serde_json::Value = match serde_json::from_str(self.buf.trim()) {
                Ok(raw) => raw,
                Err(e) => {
                    warnings.push(Warning::MalformedJson {
                        line_number,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            if !raw.is_object() {
                warnings.push(Warning::SkippedLine {
                    line_number,
                    reason: "expected a JSON object".to_string(),
                });
                continue;
            }
            match serde_json::from_value(raw) {
                Ok(value) => values.push(value),
                Err(e) => warnings.push(Warning::MalformedJson {
                    line_number,
                    error: e.to_string(),
                }),
            }
        }

        Ok((values, warnings))
    }
}

/// Loads a whole JSONL file, skipping lines that fail to parse.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened or read. Parse problems
/// never fail the load; they come back as warnings.
pub async fn read_jsonl_resilient<T, P>(path: P) -> Result<(Vec<T>, Vec<Warning>)>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).await?;
    let mut reader = JsonlReader::new(file);
    let (values, warnings) = reader.read_all_resilient().await?;

    for warning in &warnings {
        warn!(path = %path.display(), %warning, "Skipped JSONL line");
    }
    debug!(
        path = %path.display(),
        records = values.len(),
        warnings = warnings.len(),
        "Loaded JSONL file"
    );

    Ok((values, warnings))
}
