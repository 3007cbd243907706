//! Atomic write operations for JSONL files.
//!
//! Data is written to a sibling temporary file (`<name>.tmp`), flushed, and
//! renamed over the target. Renames within one filesystem are atomic on
//! POSIX systems, so readers (and file watchers) never observe a partially
//! written store file.

use crate::{JsonlWriter, Result};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Atomically writes a slice of values to a JSONL file.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be created or written, a
/// value fails to serialize, or the final rename fails. On failure the
/// original file is left untouched and the temporary file is removed on a
/// best-effort basis.
///
/// # Examples
///
/// ```no_run
/// use skein_jsonl::write_jsonl_atomic;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Issue {
///     id: String,
///     title: String,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let issues = vec![Issue { id: "bd-1".to_string(), title: "First".to_string() }];
/// write_jsonl_atomic("issues.jsonl", &issues).await?;
/// # Ok(())
/// # }
/// ```
pub async fn write_jsonl_atomic<T, P>(path: P, values: &[T]) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    write_jsonl_atomic_iter(path, values.iter()).await
}

/// Atomically writes an iterator of values to a JSONL file.
///
/// # Errors
///
/// See [`write_jsonl_atomic`].
pub async fn write_jsonl_atomic_iter<T, I, P>(path: P, values: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let temp_path = make_temp_path(path);

    if let Err(e) = write_to_temp_file(&temp_path, values).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Atomically writes already-serialized lines, each terminated by `\n`.
///
/// Lines are written verbatim, so text that does not parse as JSON survives
/// a rewrite unchanged.
///
/// # Errors
///
/// See [`write_jsonl_atomic`].
pub async fn write_lines_atomic<S, I, P>(path: P, lines: I) -> Result<()>
where
    S: AsRef<str>,
    I: IntoIterator<Item = S>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let temp_path = make_temp_path(path);

    if let Err(e) = write_lines_to_temp_file(&temp_path, lines).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }

    tokio::fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Appends `.tmp` to the file name (`issues.jsonl` -> `issues.jsonl.tmp`).
pub fn make_temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(OsString::new, std::ffi::OsStr::to_os_string);
    name.push(".tmp");
    path.with_file_name(name)
}

async fn write_to_temp_file<T, I>(temp_path: &Path, values: I) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let file = File::create(temp_path).await?;
    let mut writer = JsonlWriter::new(file);
    writer.write_all(values).await?;
    writer.flush().await?;
    writer.into_inner().sync_all().await?;
    Ok(())
}

async fn write_lines_to_temp_file<S, I>(temp_path: &Path, lines: I) -> Result<()>
where
    S: AsRef<str>,
    I: IntoIterator<Item = S>,
{
    let mut writer = BufWriter::new(File::create(temp_path).await?);
    for line in lines {
        writer.write_all(line.as_ref().as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    writer.into_inner().sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    #[case("/path/to/file.jsonl", "/path/to/file.jsonl.tmp")]
    #[case("/path/to/file", "/path/to/file.tmp")]
    #[case("/path/to/file.tar.gz", "/path/to/file.tar.gz.tmp")]
    #[case("data.jsonl", "data.jsonl.tmp")]
    fn temp_path_appends_tmp(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(make_temp_path(Path::new(input)), Path::new(expected));
    }

    #[tokio::test]
    async fn raw_lines_are_written_verbatim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        tokio::fs::write(&path, "old\n").await.unwrap();

        write_lines_atomic(&path, ["{\"id\":\"bd-1\"}", "{half typed"])
            .await
            .unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "{\"id\":\"bd-1\"}\n{half typed\n");
        assert!(!make_temp_path(&path).exists());
    }
}
