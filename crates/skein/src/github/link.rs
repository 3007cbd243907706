//! Link table between local tasks and GitHub issues.
//!
//! [`LinkStore`] is an explicit object shared through `Arc`; persistence is
//! left to the caller via [`LinkStore::export`]/[`LinkStore::import`] or the
//! JSON helpers.

use crate::domain::IssueId;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::fs;
use tracing::debug;

/// Association between a local task and a GitHub issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubLink {
    /// Local task id
    pub task_id: IssueId,
    /// GitHub issue number
    pub issue_number: u64,
    /// `owner/name`
    pub repo: String,
    /// Web URL of the issue
    pub issue_url: String,
    /// When the link was recorded
    pub linked_at: DateTime<Utc>,
}

impl GitHubLink {
    /// Link recorded now.
    pub fn new(
        task_id: IssueId,
        issue_number: u64,
        repo: impl Into<String>,
        issue_url: impl Into<String>,
    ) -> Self {
        Self {
            task_id,
            issue_number,
            repo: repo.into(),
            issue_url: issue_url.into(),
            linked_at: Utc::now(),
        }
    }
}

/// Links keyed by task id. One link per task and one task per issue.
#[derive(Debug, Default)]
pub struct LinkStore {
    links: Mutex<HashMap<IssueId, GitHubLink>>,
}

impl LinkStore {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding `links`; later entries for the same task win.
    pub fn from_links(links: impl IntoIterator<Item = GitHubLink>) -> Self {
        let store = Self::new();
        store.import(links);
        store
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<IssueId, GitHubLink>> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Link for a task.
    #[must_use]
    pub fn get(&self, task_id: &IssueId) -> Option<GitHubLink> {
        self.lock().get(task_id).cloned()
    }

    /// Link for an issue number in a repository.
    #[must_use]
    pub fn by_issue_number(&self, repo: &str, issue_number: u64) -> Option<GitHubLink> {
        self.lock()
            .values()
            .find(|l| l.issue_number == issue_number && l.repo == repo)
            .cloned()
    }

    /// Record a link, returning the task's previous link.
    ///
    /// Another task's link to the same issue is dropped.
    pub fn insert(&self, link: GitHubLink) -> Option<GitHubLink> {
        debug!(task_id = %link.task_id, issue = link.issue_number, repo = %link.repo, "Recording link");
        insert_unique(&mut self.lock(), link)
    }

    /// Drop the link for a task.
    pub fn remove(&self, task_id: &IssueId) -> Option<GitHubLink> {
        self.lock().remove(task_id)
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if there are no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Every link, ordered by task id.
    #[must_use]
    pub fn export(&self) -> Vec<GitHubLink> {
        let mut links: Vec<GitHubLink> = self.lock().values().cloned().collect();
        links.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        links
    }

    /// Merge links into the table; later links win per task and per issue.
    pub fn import(&self, links: impl IntoIterator<Item = GitHubLink>) {
        let mut table = self.lock();
        for link in links {
            insert_unique(&mut table, link);
        }
    }

    /// Flat JSON array of every link.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` on serialization failure.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }

    /// Table from a JSON array.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if `json` is not an array of links.
    pub fn from_json(json: &str) -> Result<Self> {
        let links: Vec<GitHubLink> = serde_json::from_str(json)?;
        Ok(Self::from_links(links))
    }

    /// Load the table from a file; a missing file gives an empty table.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` or `Error::Json` for an unreadable file.
    pub async fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path).await {
            Ok(json) if json.trim().is_empty() => Ok(Self::new()),
            Ok(json) => Self::from_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Write the table to a file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        fs::write(path, json).await?;
        Ok(())
    }
}

fn insert_unique(
    table: &mut HashMap<IssueId, GitHubLink>,
    link: GitHubLink,
) -> Option<GitHubLink> {
    table.retain(|task_id, existing| {
        let displaced = task_id != &link.task_id
            && existing.repo == link.repo
            && existing.issue_number == link.issue_number;
        if displaced {
            debug!(%task_id, issue = link.issue_number, "Dropping link displaced by another task");
        }
        !displaced
    });
    table.insert(link.task_id.clone(), link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn link(task: &str, number: u64) -> GitHubLink {
        GitHubLink::new(
            IssueId::new(task),
            number,
            "octo/widgets",
            format!("https://github.com/octo/widgets/issues/{number}"),
        )
    }

    #[test]
    fn lookup_by_task_and_number() {
        let store = LinkStore::new();
        store.insert(link("bd-1", 10));
        store.insert(link("bd-2", 11));

        assert_eq!(store.get(&IssueId::new("bd-2")).unwrap().issue_number, 11);
        assert_eq!(
            store.by_issue_number("octo/widgets", 10).unwrap().task_id,
            IssueId::new("bd-1")
        );
        assert!(store.by_issue_number("octo/other", 10).is_none());
    }

    #[test]
    fn insert_replaces_per_task() {
        let store = LinkStore::new();
        store.insert(link("bd-1", 10));
        let previous = store.insert(link("bd-1", 12));
        assert_eq!(previous.unwrap().issue_number, 10);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn one_task_per_issue() {
        let store = LinkStore::new();
        store.insert(link("bd-1", 10));
        store.insert(link("bd-2", 10));

        assert_eq!(store.len(), 1);
        assert!(store.get(&IssueId::new("bd-1")).is_none());
        assert_eq!(
            store.by_issue_number("octo/widgets", 10).unwrap().task_id,
            IssueId::new("bd-2")
        );

        let imported = LinkStore::from_links([link("bd-3", 4), link("bd-4", 4)]);
        assert_eq!(imported.export().len(), 1);
        assert_eq!(imported.export()[0].task_id, IssueId::new("bd-4"));
    }

    #[test]
    fn export_import_round_trip() {
        let store = LinkStore::from_links([link("bd-b", 2), link("bd-a", 1)]);
        let exported = store.export();
        assert_eq!(exported[0].task_id, IssueId::new("bd-a"));

        let json = store.to_json().unwrap();
        assert!(json.contains("\"taskId\""));
        assert!(json.contains("\"issueNumber\""));
        let restored = LinkStore::from_json(&json).unwrap();
        assert_eq!(restored.export(), exported);

        restored.remove(&IssueId::new("bd-a"));
        restored.remove(&IssueId::new("bd-b"));
        assert!(restored.is_empty());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(LinkStore::from_json("{}"), Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn save_and_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("github-links.json");

        assert!(LinkStore::load(&path).await.unwrap().is_empty());

        let store = LinkStore::from_links([link("bd-1", 3)]);
        store.save(&path).await.unwrap();
        let loaded = LinkStore::load(&path).await.unwrap();
        assert_eq!(loaded.export(), store.export());
    }
}
