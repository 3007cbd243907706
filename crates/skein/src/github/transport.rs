//! Transport to GitHub through the `gh` CLI.
//!
//! [`IssueTransport`] is the seam the reconciler talks to; [`GhCli`] is the
//! production implementation. Every `gh` call runs as a child process under
//! a timeout, and its JSON output is parsed into [`GhPayload`] right at the
//! process boundary. Any non-zero exit, malformed JSON, unexpected payload
//! shape, or timeout becomes `Error::Transport`.

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const ISSUE_FIELDS: &str = "number,title,body,state,labels,url,updatedAt";

/// Open/closed state of a GitHub issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemoteState {
    /// Open
    #[serde(alias = "open")]
    Open,
    /// Closed
    #[serde(alias = "closed")]
    Closed,
}

/// A label as `gh` reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLabel {
    /// Label name
    pub name: String,
}

/// A GitHub issue as `gh issue view/list --json` reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteIssue {
    /// Issue number
    pub number: u64,
    /// Title
    pub title: String,
    /// Markdown body
    #[serde(default)]
    pub body: String,
    /// Open or closed
    pub state: RemoteState,
    /// Labels
    #[serde(default)]
    pub labels: Vec<RemoteLabel>,
    /// Web URL
    pub url: String,
    /// Last update
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RemoteIssue {
    /// Label names, in the order GitHub returned them.
    pub fn label_names(&self) -> impl Iterator<Item = &str> + Clone {
        self.labels.iter().map(|l| l.name.as_str())
    }
}

/// Repository identity from `gh repo view --json nameWithOwner,url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoInfo {
    /// `owner/name`
    pub name_with_owner: String,
    /// Web URL
    #[serde(default)]
    pub url: Option<String>,
}

/// Every JSON shape `gh` is asked to produce, plus a fallback.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GhPayload {
    /// A single issue
    Issue(RemoteIssue),
    /// A list of issues
    IssueList(Vec<RemoteIssue>),
    /// Repository identity
    Repo(RepoInfo),
    /// Valid JSON of an unknown shape
    Unrecognized(Value),
}

impl GhPayload {
    /// Parse `gh` stdout.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the output is not JSON.
    pub fn parse(stdout: &str) -> Result<Self> {
        serde_json::from_str(stdout)
            .map_err(|e| Error::Transport(format!("malformed JSON from gh: {e}")))
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Issue(_) => "issue",
            Self::IssueList(_) => "issue list",
            Self::Repo(_) => "repository",
            Self::Unrecognized(_) => "unrecognized",
        }
    }

    fn into_issue(self) -> Result<RemoteIssue> {
        match self {
            Self::Issue(issue) => Ok(issue),
            other => Err(unexpected("issue", &other)),
        }
    }

    fn into_issue_list(self) -> Result<Vec<RemoteIssue>> {
        match self {
            Self::IssueList(issues) => Ok(issues),
            other => Err(unexpected("issue list", &other)),
        }
    }

    fn into_repo(self) -> Result<RepoInfo> {
        match self {
            Self::Repo(repo) => Ok(repo),
            other => Err(unexpected("repository", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &GhPayload) -> Error {
    Error::Transport(format!(
        "unexpected gh payload: expected {expected}, got {}",
        got.kind()
    ))
}

/// Fields of a new remote issue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IssueDraft {
    /// Title
    pub title: String,
    /// Markdown body
    pub body: String,
    /// Labels
    pub labels: Vec<String>,
}

/// Changes to an existing remote issue. Empty fields are left alone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IssueEdit {
    /// New title
    pub title: Option<String>,
    /// New body
    pub body: Option<String>,
    /// Labels to add
    pub add_labels: Vec<String>,
    /// Labels to remove
    pub remove_labels: Vec<String>,
}

impl IssueEdit {
    /// Returns `true` if the edit changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.add_labels.is_empty()
            && self.remove_labels.is_empty()
    }
}

/// A remote issue just created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    /// Issue number
    pub number: u64,
    /// Web URL
    pub url: String,
}

/// Operations against the remote tracker.
#[async_trait]
pub trait IssueTransport: Send + Sync {
    /// Verify the CLI is authenticated.
    async fn check_auth(&self) -> Result<()>;

    /// `owner/name` of the current repository.
    async fn detect_repo(&self) -> Result<String>;

    /// Create an issue.
    async fn create_issue(&self, repo: &str, draft: &IssueDraft) -> Result<CreatedIssue>;

    /// Fetch one issue.
    async fn view_issue(&self, repo: &str, number: u64) -> Result<RemoteIssue>;

    /// Change an issue's title, body, or labels.
    async fn edit_issue(&self, repo: &str, number: u64, edit: &IssueEdit) -> Result<()>;

    /// List issues in any state, newest first, up to `limit`.
    async fn list_issues(&self, repo: &str, limit: u32) -> Result<Vec<RemoteIssue>>;

    /// Reopen a closed issue.
    async fn reopen_issue(&self, repo: &str, number: u64) -> Result<()>;

    /// Close an open issue.
    async fn close_issue(&self, repo: &str, number: u64) -> Result<()>;
}

/// Parse `https://github.com/{owner}/{repo}/issues/{number}`.
///
/// Query strings and fragments are ignored.
///
/// # Errors
///
/// Returns `Error::LinkValidation` for anything else.
pub fn parse_issue_url(url: &str) -> Result<(String, u64)> {
    let invalid = || {
        Error::LinkValidation(format!(
            "'{url}' is not a GitHub issue URL (expected https://github.com/<owner>/<repo>/issues/<number>)"
        ))
    };

    let path = url
        .trim()
        .strip_prefix("https://github.com/")
        .ok_or_else(invalid)?;
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let parts: Vec<&str> = path.trim_end_matches('/').split('/').collect();

    match parts.as_slice() {
        [owner, repo, "issues", number] if !owner.is_empty() && !repo.is_empty() => {
            let number: u64 = number.parse().map_err(|_| invalid())?;
            if number == 0 {
                return Err(invalid());
            }
            Ok((format!("{owner}/{repo}"), number))
        }
        _ => Err(invalid()),
    }
}

/// [`IssueTransport`] over the `gh` command-line tool.
#[derive(Debug, Clone)]
pub struct GhCli {
    program: String,
    timeout: Duration,
}

impl GhCli {
    /// Run `gh` from `PATH` with a per-call timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("gh", timeout)
    }

    /// Run a specific executable instead of `gh`.
    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    async fn run(&self, args: &[String]) -> Result<String> {
        let command = args.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
        debug!(program = %self.program, %command, "Running gh");

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.program)
                .args(args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            Error::Transport(format!(
                "gh {command} timed out after {}ms",
                self.timeout.as_millis()
            ))
        })?
        .map_err(|e| Error::Transport(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(%command, exit_code = ?output.status.code(), "gh exited with non-zero status");
            return Err(Error::Transport(format!(
                "gh {command} failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn run_json(&self, args: &[String]) -> Result<GhPayload> {
        GhPayload::parse(&self.run(args).await?)
    }
}

fn args<const N: usize>(fixed: [&str; N]) -> Vec<String> {
    fixed.iter().map(|s| (*s).to_string()).collect()
}

#[async_trait]
impl IssueTransport for GhCli {
    async fn check_auth(&self) -> Result<()> {
        self.run(&args(["auth", "status"])).await.map(|_| ())
    }

    async fn detect_repo(&self) -> Result<String> {
        let repo = self
            .run_json(&args(["repo", "view", "--json", "nameWithOwner,url"]))
            .await?
            .into_repo()?;
        Ok(repo.name_with_owner)
    }

    async fn create_issue(&self, repo: &str, draft: &IssueDraft) -> Result<CreatedIssue> {
        let mut argv = args(["issue", "create", "--repo", repo, "--title"]);
        argv.push(draft.title.clone());
        argv.push("--body".to_string());
        argv.push(draft.body.clone());
        for label in &draft.labels {
            argv.push("--label".to_string());
            argv.push(label.clone());
        }

        // `gh issue create` prints the new issue's URL.
        let stdout = self.run(&argv).await?;
        let url = stdout
            .lines()
            .map(str::trim)
            .rfind(|l| l.starts_with("https://"))
            .ok_or_else(|| Error::Transport(format!("gh issue create printed no URL: {stdout}")))?
            .to_string();
        let (_, number) = parse_issue_url(&url)
            .map_err(|_| Error::Transport(format!("gh issue create printed an unexpected URL: {url}")))?;
        Ok(CreatedIssue { number, url })
    }

    async fn view_issue(&self, repo: &str, number: u64) -> Result<RemoteIssue> {
        let number = number.to_string();
        self.run_json(&args(["issue", "view", number.as_str(), "--repo", repo, "--json", ISSUE_FIELDS]))
            .await?
            .into_issue()
    }

    async fn edit_issue(&self, repo: &str, number: u64, edit: &IssueEdit) -> Result<()> {
        if edit.is_empty() {
            return Ok(());
        }
        let number = number.to_string();
        let mut argv = args(["issue", "edit", number.as_str(), "--repo", repo]);
        if let Some(title) = &edit.title {
            argv.push("--title".to_string());
            argv.push(title.clone());
        }
        if let Some(body) = &edit.body {
            argv.push("--body".to_string());
            argv.push(body.clone());
        }
        for label in &edit.add_labels {
            argv.push("--add-label".to_string());
            argv.push(label.clone());
        }
        for label in &edit.remove_labels {
            argv.push("--remove-label".to_string());
            argv.push(label.clone());
        }
        self.run(&argv).await.map(|_| ())
    }

    async fn list_issues(&self, repo: &str, limit: u32) -> Result<Vec<RemoteIssue>> {
        let limit = limit.to_string();
        self.run_json(&args([
            "issue", "list", "--repo", repo, "--state", "all", "--limit", limit.as_str(), "--json",
            ISSUE_FIELDS,
        ]))
        .await?
        .into_issue_list()
    }

    async fn reopen_issue(&self, repo: &str, number: u64) -> Result<()> {
        let number = number.to_string();
        self.run(&args(["issue", "reopen", number.as_str(), "--repo", repo]))
            .await
            .map(|_| ())
    }

    async fn close_issue(&self, repo: &str, number: u64) -> Result<()> {
        let number = number.to_string();
        self.run(&args(["issue", "close", number.as_str(), "--repo", repo]))
            .await
            .map(|_| ())
    }
}
