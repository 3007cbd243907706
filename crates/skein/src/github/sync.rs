//! Reconciliation between the local store and GitHub Issues.
//!
//! Single-item operations never fail as a whole: they return an
//! [`ItemOutcome`], so a batch [`GitHubSync::sync`] keeps going after one
//! item fails and reports every failure at the end.

use super::link::{GitHubLink, LinkStore};
use super::mapping::{
    add_beads_id_to_body, extract_beads_id_from_body, from_remote_state, is_mapped_label,
    issue_labels, split_labels, strip_beads_id_from_body, to_remote_state,
};
use super::transport::{parse_issue_url, IssueDraft, IssueEdit, IssueTransport, RemoteIssue, RemoteState};
use crate::config::GitHubConfig;
use crate::domain::{Issue, IssueId, IssueStatus};
use crate::error::{Error, ItemSyncError, Result};
use crate::id_generation::IdGenerator;
use crate::store::IssueRepository;
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// What a single-item sync did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// A new issue was created on the target side
    Created,
    /// The target issue was changed
    Updated,
    /// Both sides already agreed
    Unchanged,
}

/// Result of syncing one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The item is in sync
    Synced {
        /// Local task id
        task_id: IssueId,
        /// GitHub issue number
        issue_number: u64,
        /// What happened
        action: SyncAction,
    },
    /// The item could not be synced
    Failed(ItemSyncError),
}

impl ItemOutcome {
    /// Returns `true` for [`ItemOutcome::Synced`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }

    /// The failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&ItemSyncError> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Synced { .. } => None,
        }
    }
}

/// Which way a batch sync runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncDirection {
    /// Push local issues to GitHub
    ToGitHub,
    /// Pull GitHub issues into the local store
    FromGitHub,
    /// Push, then pull everything not just pushed
    #[default]
    Bidirectional,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToGitHub => write!(f, "to-github"),
            Self::FromGitHub => write!(f, "from-github"),
            Self::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

/// Totals of a batch sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitHubSyncReport {
    /// Local issues synced to GitHub
    pub pushed_to_github: usize,
    /// GitHub issues synced into the local store
    pub pulled_from_github: usize,
    /// Items that failed
    pub errors: Vec<ItemSyncError>,
}

impl GitHubSyncReport {
    /// Returns `true` if no item failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Reconciler between an [`IssueRepository`] and a GitHub repository.
pub struct GitHubSync {
    transport: Arc<dyn IssueTransport>,
    links: Arc<LinkStore>,
    repository: Arc<dyn IssueRepository>,
    config: GitHubConfig,
    prefix: String,
    repo: OnceCell<String>,
}

impl GitHubSync {
    /// Create a reconciler. `prefix` is used for ids of issues pulled in
    /// from GitHub.
    pub fn new(
        transport: Arc<dyn IssueTransport>,
        links: Arc<LinkStore>,
        repository: Arc<dyn IssueRepository>,
        config: GitHubConfig,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            links,
            repository,
            config,
            prefix: prefix.into(),
            repo: OnceCell::new(),
        }
    }

    /// The link table.
    #[must_use]
    pub fn links(&self) -> &Arc<LinkStore> {
        &self.links
    }

    /// Verify the `gh` CLI is authenticated.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if it is not.
    pub async fn check_auth(&self) -> Result<()> {
        self.transport.check_auth().await
    }

    /// Target repository: the configured one, else detected once.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if detection fails.
    pub async fn repo(&self) -> Result<&str> {
        let repo = self
            .repo
            .get_or_try_init(|| async {
                if let Some(repo) = &self.config.repo {
                    return Ok(repo.clone());
                }
                let transport = &*self.transport;
                let repo = self.with_retry("repo view", move || transport.detect_repo()).await?;
                info!(%repo, "Detected GitHub repository");
                Ok::<_, Error>(repo)
            })
            .await?;
        Ok(repo.as_str())
    }

    /// Push one local task to GitHub.
    ///
    /// A linked task updates its issue (title, body, mapped labels, state);
    /// an unlinked task creates a new issue and records the link.
    pub async fn sync_to_github(&self, task_id: &IssueId) -> ItemOutcome {
        match self.push(task_id).await {
            Ok((issue_number, action)) => {
                debug!(%task_id, issue_number, ?action, "Pushed task");
                ItemOutcome::Synced {
                    task_id: task_id.clone(),
                    issue_number,
                    action,
                }
            }
            Err(e) => {
                warn!(%task_id, error = %e, "Failed to push task");
                ItemOutcome::Failed(ItemSyncError::from_error(task_id.as_str(), &e))
            }
        }
    }

    /// Pull one GitHub issue into the local store.
    ///
    /// The local target is found through the link table, then the body
    /// marker; otherwise a new local issue is created and its id written
    /// back into the remote body.
    pub async fn sync_from_github(&self, issue_number: u64) -> ItemOutcome {
        let result = async {
            let repo = self.repo().await?;
            let transport = &*self.transport;
            let remote = self
                .with_retry("issue view", move || transport.view_issue(repo, issue_number))
                .await?;
            self.pull(repo, &remote).await
        }
        .await;
        Self::pull_outcome(issue_number, result)
    }

    /// Sync every relevant item in `direction`.
    ///
    /// In a bidirectional run, issues pushed in the same run are not pulled
    /// back.
    ///
    /// # Errors
    ///
    /// Fails only when the item set cannot be listed (store unreadable,
    /// repository undetectable, `gh issue list` failing). Per-item failures
    /// are collected in the report.
    pub async fn sync(&self, direction: SyncDirection) -> Result<GitHubSyncReport> {
        info!(%direction, "Starting GitHub sync");
        let repo = self.repo().await?;
        let mut report = GitHubSyncReport::default();
        let mut pushed: HashSet<u64> = HashSet::new();

        if matches!(direction, SyncDirection::ToGitHub | SyncDirection::Bidirectional) {
            for issue in self.repository.list().await? {
                match self.sync_to_github(&issue.id).await {
                    ItemOutcome::Synced { issue_number, .. } => {
                        report.pushed_to_github += 1;
                        pushed.insert(issue_number);
                    }
                    ItemOutcome::Failed(e) => report.errors.push(e),
                }
            }
        }

        if matches!(direction, SyncDirection::FromGitHub | SyncDirection::Bidirectional) {
            let transport = &*self.transport;
            let limit = self.config.list_limit;
            let remotes = self
                .with_retry("issue list", move || transport.list_issues(repo, limit))
                .await?;
            for remote in remotes.iter().filter(|r| !pushed.contains(&r.number)) {
                match Self::pull_outcome(remote.number, self.pull(repo, remote).await) {
                    ItemOutcome::Synced { .. } => report.pulled_from_github += 1,
                    ItemOutcome::Failed(e) => report.errors.push(e),
                }
            }
        }

        info!(
            pushed = report.pushed_to_github,
            pulled = report.pulled_from_github,
            errors = report.errors.len(),
            "GitHub sync finished"
        );
        Ok(report)
    }

    /// Link a task to an existing GitHub issue.
    ///
    /// # Errors
    ///
    /// Returns `Error::LinkValidation` for a malformed URL, an issue already
    /// linked to another task, or an issue that cannot be found remotely, and
    /// `Error::NotFound` for an unknown task.
    pub async fn link_issue(&self, task_id: &IssueId, issue_url: &str) -> Result<GitHubLink> {
        let (repo, number) = parse_issue_url(issue_url)?;
        if let Some(existing) = self.links.by_issue_number(&repo, number)
            && &existing.task_id != task_id
        {
            return Err(Error::LinkValidation(format!(
                "issue #{number} in {repo} is already linked to {}",
                existing.task_id
            )));
        }
        let mut issue = self.load_task(task_id).await?;

        let transport = &*self.transport;
        let repo_ref = repo.as_str();
        let remote = self
            .with_retry("issue view", move || transport.view_issue(repo_ref, number))
            .await
            .map_err(|e| Error::LinkValidation(format!("issue #{number} not found in {repo}: {e}")))?;

        let link = GitHubLink::new(task_id.clone(), number, repo, remote.url);
        self.links.insert(link.clone());
        if issue.external_ref.as_deref() != Some(link.issue_url.as_str()) {
            issue.external_ref = Some(link.issue_url.clone());
            self.repository.upsert(issue).await?;
        }
        info!(%task_id, issue_number = number, "Linked task");
        Ok(link)
    }

    /// Remove a task's link.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the task has no link.
    pub fn unlink_issue(&self, task_id: &IssueId) -> Result<GitHubLink> {
        let link = self
            .links
            .remove(task_id)
            .ok_or_else(|| Error::NotFound(format!("No GitHub link for task: {task_id}")))?;
        info!(%task_id, issue_number = link.issue_number, "Unlinked task");
        Ok(link)
    }

    async fn load_task(&self, task_id: &IssueId) -> Result<Issue> {
        self.repository
            .get(task_id)
            .await?
            .ok_or_else(|| Error::task_not_found(task_id))
    }

    async fn push(&self, task_id: &IssueId) -> Result<(u64, SyncAction)> {
        let mut issue = self.load_task(task_id).await?;
        let repo = self.repo().await?;
        let transport = &*self.transport;

        let labels = issue_labels(&issue, &self.config);
        let body = add_beads_id_to_body(issue.description.as_deref().unwrap_or_default(), task_id.as_str());
        let target_state = to_remote_state(issue.status);

        if let Some(link) = self.links.get(task_id) {
            let (link_repo, number) = (link.repo.as_str(), link.issue_number);
            let remote = self
                .with_retry("issue view", move || transport.view_issue(link_repo, number))
                .await?;

            let remote_labels: HashSet<&str> = remote.label_names().collect();
            let edit = IssueEdit {
                title: (remote.title != issue.title).then(|| issue.title.clone()),
                body: (remote.body.trim_end() != body).then(|| body.clone()),
                add_labels: labels
                    .iter()
                    .filter(|l| !remote_labels.contains(l.as_str()))
                    .cloned()
                    .collect(),
                remove_labels: remote_labels
                    .iter()
                    .filter(|l| is_mapped_label(l, &self.config) && !labels.contains(**l))
                    .map(|l| (*l).to_string())
                    .collect(),
            };

            let mut changed = false;
            if !edit.is_empty() {
                let edit = &edit;
                self.with_retry("issue edit", move || transport.edit_issue(link_repo, number, edit))
                    .await?;
                changed = true;
            }
            if remote.state != target_state {
                self.set_state(link_repo, number, target_state).await?;
                changed = true;
            }

            let action = if changed { SyncAction::Updated } else { SyncAction::Unchanged };
            return Ok((number, action));
        }

        let draft = IssueDraft {
            title: issue.title.clone(),
            body,
            labels: labels.into_iter().collect(),
        };
        // Not retried: a create that timed out may still have happened.
        let created = transport.create_issue(repo, &draft).await?;
        if target_state == RemoteState::Closed {
            self.set_state(repo, created.number, target_state).await?;
        }

        self.links.insert(GitHubLink::new(
            task_id.clone(),
            created.number,
            repo,
            created.url.clone(),
        ));
        issue.external_ref = Some(created.url);
        self.repository.upsert(issue).await?;
        Ok((created.number, SyncAction::Created))
    }

    async fn set_state(&self, repo: &str, number: u64, state: RemoteState) -> Result<()> {
        let transport = &*self.transport;
        match state {
            RemoteState::Open => {
                self.with_retry("issue reopen", move || transport.reopen_issue(repo, number))
                    .await
            }
            RemoteState::Closed => {
                self.with_retry("issue close", move || transport.close_issue(repo, number))
                    .await
            }
        }
    }

    fn pull_outcome(issue_number: u64, result: Result<(IssueId, SyncAction)>) -> ItemOutcome {
        match result {
            Ok((task_id, action)) => {
                debug!(issue_number, %task_id, ?action, "Pulled issue");
                ItemOutcome::Synced {
                    task_id,
                    issue_number,
                    action,
                }
            }
            Err(e) => {
                warn!(issue_number, error = %e, "Failed to pull issue");
                ItemOutcome::Failed(ItemSyncError::from_error(format!("#{issue_number}"), &e))
            }
        }
    }

    async fn pull(&self, repo: &str, remote: &RemoteIssue) -> Result<(IssueId, SyncAction)> {
        let marker = extract_beads_id_from_body(&remote.body);
        let task_id = match (self.links.by_issue_number(repo, remote.number), &marker) {
            (Some(link), _) => link.task_id,
            (None, Some(id)) => IssueId::new(id.as_str()),
            (None, None) => self.new_task_id(remote).await?,
        };

        let local = self.repository.get(&task_id).await?;
        let action = match local {
            Some(local) if remote.updated_at.is_some_and(|at| at < local.updated_at) => {
                debug!(%task_id, issue_number = remote.number, "Local copy is newer, keeping it");
                SyncAction::Unchanged
            }
            Some(local) => {
                let updated = self.apply_remote(&local, remote);
                if updated == local {
                    SyncAction::Unchanged
                } else {
                    self.repository.upsert(updated).await?;
                    SyncAction::Updated
                }
            }
            None => {
                let mut issue = Issue::new(task_id.clone(), remote.title.clone());
                let at = remote.updated_at.unwrap_or_else(Utc::now);
                issue.created_at = at;
                issue.updated_at = at;
                let issue = self.apply_remote(&issue, remote);
                self.repository.upsert(issue).await?;
                SyncAction::Created
            }
        };

        if self.links.get(&task_id).is_none_or(|l| l.issue_number != remote.number || l.repo != repo) {
            self.links.insert(GitHubLink::new(
                task_id.clone(),
                remote.number,
                repo,
                remote.url.clone(),
            ));
        }

        if marker.as_deref() != Some(task_id.as_str()) {
            let edit = IssueEdit {
                body: Some(add_beads_id_to_body(&remote.body, task_id.as_str())),
                ..IssueEdit::default()
            };
            let (edit, number, transport) = (&edit, remote.number, &*self.transport);
            self.with_retry("issue edit", move || transport.edit_issue(repo, number, edit))
                .await?;
            debug!(%task_id, issue_number = remote.number, "Wrote id marker to issue body");
        }

        Ok((task_id, action))
    }

    /// Local fields from a remote issue; `updated_at` moves only when a
    /// field changes.
    fn apply_remote(&self, local: &Issue, remote: &RemoteIssue) -> Issue {
        let mapped = split_labels(remote.label_names(), &self.config);
        let description = strip_beads_id_from_body(&remote.body);

        let mut issue = local.clone();
        issue.title.clone_from(&remote.title);
        issue.description = (!description.is_empty()).then_some(description);
        issue.status = from_remote_state(remote.state, Some(local.status));
        issue.priority = mapped.priority;
        issue.issue_type = mapped.issue_type;
        issue.labels = mapped.labels;
        issue.external_ref = Some(remote.url.clone());

        if issue != *local {
            let at = remote.updated_at.unwrap_or_else(Utc::now).max(local.updated_at);
            issue.updated_at = at;
            issue.closed_at = match issue.status {
                IssueStatus::Closed => local.closed_at.or(Some(at)),
                IssueStatus::Open | IssueStatus::InProgress => None,
            };
        }
        issue
    }

    async fn new_task_id(&self, remote: &RemoteIssue) -> Result<IssueId> {
        let existing = self.repository.list().await?;
        let mut generator = IdGenerator::new(
            self.prefix.as_str(),
            existing.into_iter().map(|i| i.id.0),
        );
        Ok(IssueId::new(generator.generate(&remote.title, &remote.body)))
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(operation, attempt, error = %e, "gh call failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
