//! GitHub Issues reconciliation through the `gh` CLI.
//!
//! - [`mapping`]: pure field mappers (status, priority/type labels, id marker)
//! - [`link`]: the task ↔ issue link table
//! - [`transport`]: the `gh` subprocess boundary
//! - [`sync`]: [`GitHubSync`], pushing and pulling issues

pub mod link;
pub mod mapping;
pub mod sync;
pub mod transport;

pub use link::{GitHubLink, LinkStore};
pub use sync::{GitHubSync, GitHubSyncReport, ItemOutcome, SyncAction, SyncDirection};
pub use transport::{
    parse_issue_url, CreatedIssue, GhCli, GhPayload, IssueDraft, IssueEdit, IssueTransport,
    RemoteIssue, RemoteLabel, RemoteState, RepoInfo,
};
