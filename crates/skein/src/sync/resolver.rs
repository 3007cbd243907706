//! Conflict resolution strategies.
//!
//! Resolution rules:
//! - `local-wins` / `remote-wins`: the named side's new state is kept
//! - `most-recent`: the later effective timestamp wins; ties go to local
//! - `merge`: field-level, against the state before the earliest pending
//!   change; a field changed on only one side takes that side's value, a
//!   field changed on both sides follows `most-recent`
//! - `manual`: the caller's state is applied verbatim
//!
//! Resolving is pure: it produces a [`Resolution`] and never touches disk.

use super::change::{ChangeRecord, ConflictRecord};
use crate::domain::{Issue, IssueId};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// How a conflict is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Keep the local state
    LocalWins,
    /// Keep the remote state
    RemoteWins,
    /// Keep whichever side changed last
    MostRecent,
    /// Field-level merge
    Merge,
    /// Wait for a caller-supplied state
    #[default]
    Manual,
}

impl ConflictStrategy {
    /// Wire name of the strategy.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalWins => "local-wins",
            Self::RemoteWins => "remote-wins",
            Self::MostRecent => "most-recent",
            Self::Merge => "merge",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local-wins" => Ok(Self::LocalWins),
            "remote-wins" => Ok(Self::RemoteWins),
            "most-recent" => Ok(Self::MostRecent),
            "merge" => Ok(Self::Merge),
            "manual" => Ok(Self::Manual),
            other => Err(Error::Configuration(format!(
                "unknown conflict strategy '{other}' (expected local-wins, remote-wins, most-recent, merge, or manual)"
            ))),
        }
    }
}

/// Which side the resolved state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    /// Local state kept; nothing to write locally
    Local,
    /// Remote state kept; nothing to publish
    Remote,
    /// Field-level merge of both
    Merged,
    /// Caller-supplied state
    Manual,
}

/// Outcome of resolving one conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Resolved issue
    pub issue_id: IssueId,
    /// Strategy that produced the outcome
    pub strategy: ConflictStrategy,
    /// Side the state came from
    pub winner: Winner,
    /// Resolved state; `None` means the issue is deleted
    pub state: Option<Issue>,
    /// When the conflict was resolved
    pub resolved_at: DateTime<Utc>,
}

/// Resolve a conflict with `strategy`.
///
/// # Errors
///
/// Returns `Error::Conflict` for `manual` without a supplied state, and
/// `Error::Json` if a merged state no longer forms a valid issue.
pub fn resolve(
    conflict: &ConflictRecord,
    strategy: ConflictStrategy,
    manual_state: Option<Issue>,
) -> Result<Resolution> {
    let (winner, state) = match strategy {
        ConflictStrategy::LocalWins => (Winner::Local, conflict.local.new_state.clone()),
        ConflictStrategy::RemoteWins => (Winner::Remote, conflict.remote.new_state.clone()),
        ConflictStrategy::MostRecent => most_recent(&conflict.local, &conflict.remote),
        ConflictStrategy::Merge => merge(conflict)?,
        ConflictStrategy::Manual => {
            let Some(state) = manual_state else {
                return Err(Error::Conflict {
                    issue_id: conflict.issue_id.to_string(),
                    message: "manual resolution requires a state".to_string(),
                });
            };
            (Winner::Manual, Some(state))
        }
    };

    Ok(Resolution {
        issue_id: conflict.issue_id.clone(),
        strategy,
        winner,
        state,
        resolved_at: Utc::now(),
    })
}

fn most_recent(local: &ChangeRecord, remote: &ChangeRecord) -> (Winner, Option<Issue>) {
    if remote.effective_timestamp() > local.effective_timestamp() {
        (Winner::Remote, remote.new_state.clone())
    } else {
        (Winner::Local, local.new_state.clone())
    }
}

fn merge(conflict: &ConflictRecord) -> Result<(Winner, Option<Issue>)> {
    let (local, remote) = (&conflict.local, &conflict.remote);
    let (Some(local_state), Some(remote_state)) = (&local.new_state, &remote.new_state) else {
        // A delete on either side leaves nothing to merge field by field.
        return Ok(most_recent(local, remote));
    };
    let base = conflict
        .base
        .as_ref()
        .or(local.previous_state.as_ref())
        .or(remote.previous_state.as_ref());
    let Some(base) = base else {
        return Ok(most_recent(local, remote));
    };

    let remote_is_newer = remote.effective_timestamp() > local.effective_timestamp();
    let base = to_object(base)?;
    let ours = to_object(local_state)?;
    let theirs = to_object(remote_state)?;

    let mut merged = Map::new();
    let keys = base.keys().chain(ours.keys()).chain(theirs.keys());
    for key in keys {
        if merged.contains_key(key) {
            continue;
        }
        let (b, l, r) = (base.get(key), ours.get(key), theirs.get(key));
        let value = match (l != b, r != b) {
            (true, true) if remote_is_newer => r,
            (true, _) => l,
            (false, true) => r,
            (false, false) => l,
        };
        if let Some(value) = value {
            merged.insert(key.clone(), value.clone());
        }
    }

    let mut issue: Issue = serde_json::from_value(Value::Object(merged))?;
    issue.updated_at = local_state.updated_at.max(remote_state.updated_at);
    Ok((Winner::Merged, Some(issue)))
}

fn to_object(issue: &Issue) -> Result<Map<String, Value>> {
    match serde_json::to_value(issue)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}
