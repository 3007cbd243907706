//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skein::Error;
use skein::github::{
    CreatedIssue, IssueDraft, IssueEdit, IssueTransport, RemoteIssue, RemoteLabel, RemoteState,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

pub const REPO: &str = "octo/widgets";

/// In-memory stand-in for the `gh` CLI.
#[derive(Default)]
pub struct FakeTransport {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    issues: BTreeMap<u64, RemoteIssue>,
    next_number: u64,
    failing_titles: HashSet<String>,
    transient_failures: u32,
    calls: Vec<String>,
}

pub fn issue_url(number: u64) -> String {
    format!("https://github.com/{REPO}/issues/{number}")
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a remote issue.
    pub fn add_issue(
        &self,
        number: u64,
        title: &str,
        body: &str,
        labels: &[&str],
        updated_at: DateTime<Utc>,
    ) {
        let mut state = self.state.lock().unwrap();
        state.next_number = state.next_number.max(number);
        state.issues.insert(
            number,
            RemoteIssue {
                number,
                title: title.to_string(),
                body: body.to_string(),
                state: RemoteState::Open,
                labels: labels
                    .iter()
                    .map(|l| RemoteLabel {
                        name: (*l).to_string(),
                    })
                    .collect(),
                url: issue_url(number),
                updated_at: Some(updated_at),
            },
        );
    }

    /// Make `create_issue` fail for drafts with this title.
    pub fn fail_title(&self, title: &str) {
        self.state.lock().unwrap().failing_titles.insert(title.to_string());
    }

    /// Fail the next `n` calls with a transport error.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().unwrap().transient_failures = n;
    }

    pub fn issue(&self, number: u64) -> RemoteIssue {
        self.state.lock().unwrap().issues[&number].clone()
    }

    pub fn set_state(&self, number: u64, remote_state: RemoteState) {
        let mut state = self.state.lock().unwrap();
        if let Some(issue) = state.issues.get_mut(&number) {
            issue.state = remote_state;
        }
    }

    pub fn add_label(&self, number: u64, label: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(issue) = state.issues.get_mut(&number) {
            issue.labels.push(RemoteLabel {
                name: label.to_string(),
            });
        }
    }

    pub fn label_names(&self, number: u64) -> Vec<String> {
        let mut labels: Vec<String> = self
            .issue(number)
            .labels
            .into_iter()
            .map(|l| l.name)
            .collect();
        labels.sort();
        labels
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn enter(&self, call: String) -> skein::Result<std::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(Error::Transport("connection reset".to_string()));
        }
        Ok(state)
    }
}

fn not_found(number: u64) -> Error {
    Error::Transport(format!("GraphQL: Could not resolve to an issue with the number of {number}"))
}

#[async_trait]
impl IssueTransport for FakeTransport {
    async fn check_auth(&self) -> skein::Result<()> {
        self.enter("auth".to_string()).map(|_| ())
    }

    async fn detect_repo(&self) -> skein::Result<String> {
        self.enter("repo".to_string()).map(|_| REPO.to_string())
    }

    async fn create_issue(&self, _repo: &str, draft: &IssueDraft) -> skein::Result<CreatedIssue> {
        let mut state = self.enter(format!("create {}", draft.title))?;
        if state.failing_titles.contains(&draft.title) {
            return Err(Error::Transport("HTTP 422: validation failed".to_string()));
        }
        state.next_number += 1;
        let number = state.next_number;
        state.issues.insert(
            number,
            RemoteIssue {
                number,
                title: draft.title.clone(),
                body: draft.body.clone(),
                state: RemoteState::Open,
                labels: draft
                    .labels
                    .iter()
                    .map(|l| RemoteLabel { name: l.clone() })
                    .collect(),
                url: issue_url(number),
                updated_at: Some(Utc::now()),
            },
        );
        Ok(CreatedIssue {
            number,
            url: issue_url(number),
        })
    }

    async fn view_issue(&self, _repo: &str, number: u64) -> skein::Result<RemoteIssue> {
        let state = self.enter(format!("view {number}"))?;
        state.issues.get(&number).cloned().ok_or_else(|| not_found(number))
    }

    async fn edit_issue(&self, _repo: &str, number: u64, edit: &IssueEdit) -> skein::Result<()> {
        let mut state = self.enter(format!("edit {number}"))?;
        let issue = state.issues.get_mut(&number).ok_or_else(|| not_found(number))?;
        if let Some(title) = &edit.title {
            issue.title.clone_from(title);
        }
        if let Some(body) = &edit.body {
            issue.body.clone_from(body);
        }
        issue.labels.retain(|l| !edit.remove_labels.contains(&l.name));
        for label in &edit.add_labels {
            issue.labels.push(RemoteLabel { name: label.clone() });
        }
        issue.updated_at = Some(Utc::now());
        Ok(())
    }

    async fn list_issues(&self, _repo: &str, limit: u32) -> skein::Result<Vec<RemoteIssue>> {
        let state = self.enter("list".to_string())?;
        Ok(state
            .issues
            .values()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn reopen_issue(&self, _repo: &str, number: u64) -> skein::Result<()> {
        let mut state = self.enter(format!("reopen {number}"))?;
        let issue = state.issues.get_mut(&number).ok_or_else(|| not_found(number))?;
        issue.state = RemoteState::Open;
        Ok(())
    }

    async fn close_issue(&self, _repo: &str, number: u64) -> skein::Result<()> {
        let mut state = self.enter(format!("close {number}"))?;
        let issue = state.issues.get_mut(&number).ok_or_else(|| not_found(number))?;
        issue.state = RemoteState::Closed;
        Ok(())
    }
}
