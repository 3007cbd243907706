//! File-backed repository over a tracked directory of JSONL files.
//!
//! The directory may hold several `*.jsonl` files; every file contributes
//! issues. Writes go to the file that already holds the issue, or to the
//! primary store file for new issues. Each write rewrites that one file
//! atomically (temp file + rename). Lines that did not load, such as a
//! half-typed edit or an issue that fails validation, are written back
//! untouched in their original position.

use super::{IssueRepository, IssueStore};
use crate::domain::{Issue, IssueId};
use crate::error::{Error, Result};
use async_trait::async_trait;
use skein_jsonl::{read_jsonl_resilient, write_lines_atomic, Warning as JsonlWarning};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Non-fatal problems found while loading the tracked directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// A line could not be parsed as an issue; the line was skipped.
    MalformedJson {
        /// File containing the line
        file: PathBuf,
        /// 1-based line number
        line_number: usize,
        /// Parse error
        error: String,
    },

    /// An issue parsed but failed validation; the issue was skipped.
    InvalidIssueData {
        /// Offending issue
        issue_id: IssueId,
        /// Validation failure
        error: String,
    },

    /// The same ID appears more than once; the last occurrence wins.
    DuplicateIssue {
        /// Repeated issue ID
        issue_id: IssueId,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedJson {
                file,
                line_number,
                error,
            } => write!(f, "{}:{line_number}: {error}", file.display()),
            Self::InvalidIssueData { issue_id, error } => {
                write!(f, "invalid issue {issue_id}: {error}")
            }
            Self::DuplicateIssue { issue_id } => write!(f, "duplicate issue {issue_id}"),
        }
    }
}

/// JSONL repository rooted at a tracked directory.
pub struct JsonlStore {
    dir: PathBuf,
    issues_file: String,
    extension: String,
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Create a repository for `dir`. No I/O happens until first use.
    pub fn new(dir: impl Into<PathBuf>, issues_file: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            issues_file: issues_file.into(),
            extension: extension.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The tracked directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The tracked file extension (without the dot).
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Path of the primary store file that receives new issues.
    #[must_use]
    pub fn primary_path(&self) -> PathBuf {
        self.dir.join(&self.issues_file)
    }

    /// Returns `true` if `path` carries the tracked extension.
    #[must_use]
    pub fn is_tracked(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }

    /// Tracked files in the directory, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the directory cannot be listed.
    pub async fn tracked_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && self.is_tracked(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Load every tracked file into an [`IssueStore`].
    ///
    /// # Errors
    ///
    /// Only I/O failures are fatal; bad lines and invalid issues come back as
    /// warnings.
    pub async fn load_all(&self) -> Result<(IssueStore, Vec<LoadWarning>)> {
        let mut store = IssueStore::new();
        let mut warnings = Vec::new();

        for file in self.tracked_files().await? {
            let (issues, file_warnings) = self.load_file(&file).await?;
            warnings.extend(file_warnings);
            for issue in issues {
                if store.contains(&issue.id) {
                    warnings.push(LoadWarning::DuplicateIssue {
                        issue_id: issue.id.clone(),
                    });
                }
                store.insert(issue);
            }
        }

        debug!(
            dir = %self.dir.display(),
            issues = store.len(),
            warnings = warnings.len(),
            "Loaded tracked directory"
        );
        Ok((store, warnings))
    }

    async fn load_file(&self, path: &Path) -> Result<(Vec<Issue>, Vec<LoadWarning>)> {
        let (parsed, jsonl_warnings) = read_jsonl_resilient::<Issue, _>(path).await?;

        let mut warnings: Vec<LoadWarning> = jsonl_warnings
            .into_iter()
            .map(|w| {
                let line_number = w.line_number();
                let error = match w {
                    JsonlWarning::MalformedJson { error, .. } => error,
                    JsonlWarning::SkippedLine { reason, .. } => reason,
                };
                LoadWarning::MalformedJson {
                    file: path.to_path_buf(),
                    line_number,
                    error,
                }
            })
            .collect();

        let mut issues = Vec::with_capacity(parsed.len());
        for issue in parsed {
            match issue.validate() {
                Ok(()) => issues.push(issue),
                Err(error) => {
                    warn!(issue_id = %issue.id, %error, "Skipping invalid issue");
                    warnings.push(LoadWarning::InvalidIssueData {
                        issue_id: issue.id,
                        error,
                    });
                }
            }
        }
        Ok((issues, warnings))
    }

    /// Find the tracked file that currently holds `id`.
    async fn locate(&self, id: &IssueId) -> Result<Option<StoreFile>> {
        for file in self.tracked_files().await? {
            let parsed = StoreFile::read(file).await?;
            if parsed.position(id).is_some() {
                return Ok(Some(parsed));
            }
        }
        Ok(None)
    }

    async fn require_primary(&self) -> Result<PathBuf> {
        let primary = self.primary_path();
        if tokio::fs::try_exists(&primary).await? {
            Ok(primary)
        } else {
            Err(Error::NotFound(format!(
                "file not found: {}",
                primary.display()
            )))
        }
    }
}

#[async_trait]
impl IssueRepository for JsonlStore {
    async fn get(&self, id: &IssueId) -> Result<Option<Issue>> {
        let (mut store, _) = self.load_all().await?;
        Ok(store.remove(id))
    }

    async fn list(&self) -> Result<Vec<Issue>> {
        let (store, _) = self.load_all().await?;
        Ok(store.to_vec())
    }

    async fn upsert(&self, issue: Issue) -> Result<Option<Issue>> {
        let _guard = self.write_lock.lock().await;
        let primary = self.require_primary().await?;

        let mut file = match self.locate(&issue.id).await? {
            Some(found) => found,
            None => StoreFile::read(primary).await?,
        };
        let previous = file.upsert(issue)?;
        file.write().await?;
        debug!(path = %file.path.display(), replaced = previous.is_some(), "Wrote issue");
        Ok(previous)
    }

    async fn remove(&self, id: &IssueId) -> Result<Option<Issue>> {
        let _guard = self.write_lock.lock().await;
        self.require_primary().await?;

        let Some(mut file) = self.locate(id).await? else {
            return Ok(None);
        };
        let removed = file.remove(id);
        file.write().await?;
        debug!(path = %file.path.display(), issue_id = %id, "Removed issue");
        Ok(removed)
    }
}

/// One line of a store file, kept as read.
struct StoreLine {
    raw: String,
    /// Set when the line holds a valid issue.
    issue: Option<Issue>,
}

/// A tracked file held line by line for rewriting.
struct StoreFile {
    path: PathBuf,
    lines: Vec<StoreLine>,
}

impl StoreFile {
    async fn read(path: PathBuf) -> Result<Self> {
        let content = tokio::fs::read_to_string(&path).await?;
        let lines = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| StoreLine {
                raw: line.to_string(),
                issue: serde_json::from_str::<Issue>(line)
                    .ok()
                    .filter(|issue| issue.validate().is_ok()),
            })
            .collect();
        Ok(Self { path, lines })
    }

    /// Index of the line that wins for `id` on load (the last one).
    fn position(&self, id: &IssueId) -> Option<usize> {
        self.lines
            .iter()
            .rposition(|line| line.issue.as_ref().is_some_and(|i| &i.id == id))
    }

    fn upsert(&mut self, issue: Issue) -> Result<Option<Issue>> {
        let line = StoreLine {
            raw: serde_json::to_string(&issue)?,
            issue: Some(issue),
        };
        match line.issue.as_ref().and_then(|i| self.position(&i.id)) {
            Some(pos) => Ok(std::mem::replace(&mut self.lines[pos], line).issue),
            None => {
                self.lines.push(line);
                Ok(None)
            }
        }
    }

    /// Drops every line holding `id` and returns the one that was winning.
    fn remove(&mut self, id: &IssueId) -> Option<Issue> {
        let removed = self.position(id).and_then(|pos| self.lines[pos].issue.clone());
        self.lines
            .retain(|line| line.issue.as_ref().is_none_or(|i| &i.id != id));
        removed
    }

    async fn write(&self) -> Result<()> {
        let lines: Vec<&str> = self.lines.iter().map(|line| line.raw.as_str()).collect();
        write_lines_atomic(&self.path, lines).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_jsonl::write_jsonl_atomic;
    use tempfile::tempdir;

    async fn store_with(issues: &[Issue]) -> (tempfile::TempDir, JsonlStore) {
        let dir = tempdir().unwrap();
        let store = JsonlStore::new(dir.path(), "issues.jsonl", "jsonl");
        write_jsonl_atomic(store.primary_path(), issues).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn upsert_then_get() {
        let (_dir, store) = store_with(&[Issue::new("bd-1", "First")]).await;

        let previous = store.upsert(Issue::new("bd-2", "Second")).await.unwrap();
        assert!(previous.is_none());

        let loaded = store.get(&IssueId::new("bd-2")).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Second");
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn upsert_rewrites_the_file_that_holds_the_issue() {
        let (dir, store) = store_with(&[Issue::new("bd-1", "First")]).await;
        let other = dir.path().join("archive.jsonl");
        write_jsonl_atomic(&other, &[Issue::new("bd-9", "Archived")])
            .await
            .unwrap();

        store.upsert(Issue::new("bd-9", "Revived")).await.unwrap();

        let (archived, _): (Vec<Issue>, _) = read_jsonl_resilient(&other).await.unwrap();
        assert_eq!(archived[0].title, "Revived");
        let (primary, _): (Vec<Issue>, _) =
            read_jsonl_resilient(store.primary_path()).await.unwrap();
        assert_eq!(primary.len(), 1);
    }

    #[tokio::test]
    async fn writes_fail_when_primary_file_is_missing() {
        let dir = tempdir().unwrap();
        let store = JsonlStore::new(dir.path(), "issues.jsonl", "jsonl");

        let err = store.upsert(Issue::new("bd-1", "x")).await.unwrap_err();
        assert!(err.to_string().contains("file not found"));
    }

    #[tokio::test]
    async fn invalid_and_malformed_lines_become_warnings() {
        let dir = tempdir().unwrap();
        let store = JsonlStore::new(dir.path(), "issues.jsonl", "jsonl");
        let good = serde_json::to_string(&Issue::new("bd-1", "ok")).unwrap();
        let bad_priority = serde_json::to_string(&Issue::new("bd-2", "bad").with_priority(9)).unwrap();
        tokio::fs::write(
            store.primary_path(),
            format!("{good}\n{{broken\n{bad_priority}\n"),
        )
        .await
        .unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), "ignored").await.unwrap();

        let (loaded, warnings) = store.load_all().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(warnings.len(), 2);
        assert!(matches!(warnings[0], LoadWarning::MalformedJson { line_number: 2, .. }));
        assert!(matches!(warnings[1], LoadWarning::InvalidIssueData { .. }));
    }

    #[tokio::test]
    async fn writes_keep_lines_that_did_not_load() {
        let dir = tempdir().unwrap();
        let store = JsonlStore::new(dir.path(), "issues.jsonl", "jsonl");
        let good = serde_json::to_string(&Issue::new("bd-1", "ok")).unwrap();
        let bad_priority =
            serde_json::to_string(&Issue::new("bd-2", "bad").with_priority(9)).unwrap();
        let truncated = r#"{"id":"bd-3","title":"half"#;
        tokio::fs::write(
            store.primary_path(),
            format!("{good}\n{truncated}\n{bad_priority}\n"),
        )
        .await
        .unwrap();

        store.upsert(Issue::new("bd-4", "new")).await.unwrap();
        store.upsert(Issue::new("bd-1", "edited")).await.unwrap();

        let content = tokio::fs::read_to_string(store.primary_path()).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("edited"));
        assert_eq!(lines[1], truncated);
        assert_eq!(lines[2], bad_priority);
        assert!(lines[3].contains("bd-4"));

        store.remove(&IssueId::new("bd-4")).await.unwrap();
        let content = tokio::fs::read_to_string(store.primary_path()).await.unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.contains(truncated));
        assert!(content.contains(&bad_priority));
    }
}
