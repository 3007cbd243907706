//! JSONL writing operations.

use crate::error::{Error, Result};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Async writer for JSONL (JSON Lines) data.
///
/// Each value is serialized to a single line followed by `\n`. Output is
/// buffered; call [`flush`](Self::flush) before dropping the writer.
pub struct JsonlWriter<W> {
    writer: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> JsonlWriter<W> {
    /// Creates a new `JsonlWriter` wrapping the given async writer.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Serializes one value as a line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails or [`Error::Io`] if the
    /// write fails.
    pub async fn write<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let mut line =
            serde_json::to_vec(value).map_err(|source| Error::Json { line: 0, source })?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        Ok(())
    }

    /// Serializes every value from an iterator, one per line.
    ///
    /// # Errors
    ///
    /// Stops at the first serialization or write failure.
    pub async fn write_all<T, I>(&mut self, values: I) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.write(&value).await?;
        }
        Ok(())
    }

    /// Flushes buffered output to the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the flush fails.
    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }

    /// Consumes the writer, returning the underlying writer.
    ///
    /// Does not flush.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Record<'a> {
        id: u32,
        name: &'a str,
    }

    #[tokio::test]
    async fn writes_one_line_per_value() {
        let mut writer = JsonlWriter::new(Vec::new());
        writer
            .write_all([Record { id: 1, name: "a" }, Record { id: 2, name: "b" }])
            .await
            .unwrap();
        writer.flush().await.unwrap();

        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(out, "{\"id\":1,\"name\":\"a\"}\n{\"id\":2,\"name\":\"b\"}\n");
    }
}
