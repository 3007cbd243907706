//! Issue storage.
//!
//! Two layers live here:
//!
//! - [`IssueStore`]: the in-memory set of issues and their dependency edges.
//!   Pure data, no I/O; the graph engine and the watcher's baseline are built
//!   from it.
//! - [`IssueRepository`]: the async storage seam used by the sync layers.
//!   [`JsonlStore`] implements it over a tracked directory of JSONL files,
//!   and [`SharedIssueStore`] implements it purely in memory.
//!
//! Repository methods take `&self`; implementations use interior mutability
//! so one repository can be shared between the sync manager and the GitHub
//! reconciler.

use crate::domain::{Dependency, Issue, IssueId};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

mod jsonl;

pub use jsonl::{JsonlStore, LoadWarning};

/// Async storage trait for issues.
///
/// # Errors
///
/// File-backed implementations return `Error::NotFound` when the backing
/// store file is missing and `Error::Io`/`Error::Jsonl` on I/O failures.
#[async_trait]
pub trait IssueRepository: Send + Sync {
    /// Get an issue by ID. Returns `None` if it doesn't exist.
    async fn get(&self, id: &IssueId) -> Result<Option<Issue>>;

    /// List every issue, ordered by ID.
    async fn list(&self) -> Result<Vec<Issue>>;

    /// Insert or replace an issue, returning the previous version.
    async fn upsert(&self, issue: Issue) -> Result<Option<Issue>>;

    /// Remove an issue, returning it if it existed.
    async fn remove(&self, id: &IssueId) -> Result<Option<Issue>>;
}

/// In-memory issue set keyed by ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueStore {
    issues: HashMap<IssueId, Issue>,
}

impl IssueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from issues. Later duplicates replace earlier ones.
    pub fn from_issues(issues: impl IntoIterator<Item = Issue>) -> Self {
        Self {
            issues: issues.into_iter().map(|i| (i.id.clone(), i)).collect(),
        }
    }

    /// Number of issues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if the store holds no issues.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns `true` if an issue with this ID exists.
    #[must_use]
    pub fn contains(&self, id: &IssueId) -> bool {
        self.issues.contains_key(id)
    }

    /// Borrow an issue.
    #[must_use]
    pub fn get(&self, id: &IssueId) -> Option<&Issue> {
        self.issues.get(id)
    }

    /// Insert or replace an issue, returning the previous version.
    pub fn insert(&mut self, issue: Issue) -> Option<Issue> {
        self.issues.insert(issue.id.clone(), issue)
    }

    /// Remove an issue.
    pub fn remove(&mut self, id: &IssueId) -> Option<Issue> {
        self.issues.remove(id)
    }

    /// All issues, ordered by ID.
    #[must_use]
    pub fn list(&self) -> Vec<&Issue> {
        let mut issues: Vec<&Issue> = self.issues.values().collect();
        issues.sort_by(|a, b| a.id.cmp(&b.id));
        issues
    }

    /// Owned copies of all issues, ordered by ID.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Issue> {
        self.list().into_iter().cloned().collect()
    }

    /// Dependencies recorded on `id` (edges where `id` is the dependent).
    #[must_use]
    pub fn dependencies_of(&self, id: &IssueId) -> &[Dependency] {
        self.issues
            .get(id)
            .map_or(&[][..], |issue| issue.dependencies.as_slice())
    }

    /// Issues that depend on `id`, ordered by ID.
    #[must_use]
    pub fn dependents_of(&self, id: &IssueId) -> Vec<&Issue> {
        self.list()
            .into_iter()
            .filter(|issue| issue.dependencies.iter().any(|d| &d.depends_on_id == id))
            .collect()
    }

    /// Consume the store, yielding the issue map.
    #[must_use]
    pub fn into_map(self) -> HashMap<IssueId, Issue> {
        self.issues
    }
}

/// Thread-safe in-memory repository.
pub type SharedIssueStore = Arc<Mutex<IssueStore>>;

/// Create an in-memory repository seeded with `issues`.
pub fn new_shared_store(issues: impl IntoIterator<Item = Issue>) -> SharedIssueStore {
    Arc::new(Mutex::new(IssueStore::from_issues(issues)))
}

#[async_trait]
impl IssueRepository for SharedIssueStore {
    async fn get(&self, id: &IssueId) -> Result<Option<Issue>> {
        Ok(self.lock().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Issue>> {
        Ok(self.lock().await.to_vec())
    }

    async fn upsert(&self, issue: Issue) -> Result<Option<Issue>> {
        Ok(self.lock().await.insert(issue))
    }

    async fn remove(&self, id: &IssueId) -> Result<Option<Issue>> {
        Ok(self.lock().await.remove(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependents_are_found_through_dependency_lists() {
        let store = IssueStore::from_issues([
            Issue::new("bd-1", "Base"),
            Issue::new("bd-2", "Needs base").depends_on("bd-1"),
            Issue::new("bd-3", "Also needs base").depends_on("bd-1"),
        ]);

        let dependents: Vec<&str> = store
            .dependents_of(&IssueId::new("bd-1"))
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(dependents, vec!["bd-2", "bd-3"]);
        assert_eq!(store.dependencies_of(&IssueId::new("bd-2")).len(), 1);
        assert!(store.dependencies_of(&IssueId::new("missing")).is_empty());
    }

    #[test]
    fn list_is_ordered_by_id() {
        let store = IssueStore::from_issues([
            Issue::new("bd-3", "c"),
            Issue::new("bd-1", "a"),
            Issue::new("bd-2", "b"),
        ]);
        let ids: Vec<&str> = store.list().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["bd-1", "bd-2", "bd-3"]);
    }

    #[tokio::test]
    async fn shared_store_implements_repository() {
        let repo = new_shared_store([Issue::new("bd-1", "a")]);

        assert!(repo.get(&IssueId::new("bd-1")).await.unwrap().is_some());
        let previous = repo.upsert(Issue::new("bd-1", "renamed")).await.unwrap();
        assert_eq!(previous.unwrap().title, "a");
        assert_eq!(repo.list().await.unwrap()[0].title, "renamed");
        assert!(repo.remove(&IssueId::new("bd-1")).await.unwrap().is_some());
        assert!(repo.list().await.unwrap().is_empty());
    }
}
