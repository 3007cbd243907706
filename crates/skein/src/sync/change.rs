//! Change records and the pending-change ledger.
//!
//! Every observed modification becomes a [`ChangeRecord`] stamped with its
//! source. Records wait in [`ChangeLog`] until a sync pass consumes them or a
//! conflict resolution discards them. A conflict exists while both sides have
//! a pending record for the same issue; the log keeps at most one
//! [`ConflictRecord`] per issue.

use crate::domain::{Issue, IssueId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Issue appeared
    Create,
    /// Issue fields changed
    Update,
    /// Issue disappeared
    Delete,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Where a change was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSource {
    /// The tracked directory on this machine
    Local,
    /// A remote peer
    Remote,
}

impl ChangeSource {
    /// The other side.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Local => Self::Remote,
            Self::Remote => Self::Local,
        }
    }
}

impl fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// One observed modification of one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Affected issue
    pub issue_id: IssueId,
    /// Kind of modification
    pub change_type: ChangeType,
    /// When the change was recorded
    pub timestamp: DateTime<Utc>,
    /// Side that produced the change
    pub source: ChangeSource,
    /// State before the change, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<Issue>,
    /// State after the change (`None` for deletes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_state: Option<Issue>,
}

impl ChangeRecord {
    /// Create a record stamped now.
    pub fn new(issue_id: impl Into<IssueId>, change_type: ChangeType, source: ChangeSource) -> Self {
        Self {
            issue_id: issue_id.into(),
            change_type,
            timestamp: Utc::now(),
            source,
            previous_state: None,
            new_state: None,
        }
    }

    /// A create or update carrying `issue` as its new state.
    #[must_use]
    pub fn upsert(issue: Issue, previous: Option<Issue>, source: ChangeSource) -> Self {
        let change_type = if previous.is_some() {
            ChangeType::Update
        } else {
            ChangeType::Create
        };
        let mut record = Self::new(issue.id.clone(), change_type, source);
        record.previous_state = previous;
        record.new_state = Some(issue);
        record
    }

    /// A delete of `previous`.
    #[must_use]
    pub fn delete(previous: Issue, source: ChangeSource) -> Self {
        let mut record = Self::new(previous.id.clone(), ChangeType::Delete, source);
        record.previous_state = Some(previous);
        record
    }

    /// Builder-style: set the previous state.
    #[must_use]
    pub fn with_previous(mut self, previous: Issue) -> Self {
        self.previous_state = Some(previous);
        self
    }

    /// Builder-style: set the new state.
    #[must_use]
    pub fn with_new(mut self, new_state: Issue) -> Self {
        self.new_state = Some(new_state);
        self
    }

    /// `updated_at` of the new state, falling back to the record timestamp.
    #[must_use]
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.new_state
            .as_ref()
            .map_or(self.timestamp, |issue| issue.updated_at)
    }
}

/// Concurrent local and remote changes to one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Conflicting issue
    pub issue_id: IssueId,
    /// Latest pending local change
    pub local: ChangeRecord,
    /// Latest pending remote change
    pub remote: ChangeRecord,
    /// State before the earliest pending change to this issue
    #[serde(default)]
    pub base: Option<Issue>,
    /// When the conflict was first detected
    pub detected_at: DateTime<Utc>,
}

/// Pending changes on both sides plus detected conflicts.
#[derive(Debug, Clone, Default)]
pub struct ChangeLog {
    local: Vec<ChangeRecord>,
    remote: Vec<ChangeRecord>,
    conflicts: Vec<ConflictRecord>,
}

impl ChangeLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending local changes, oldest first.
    #[must_use]
    pub fn pending_local(&self) -> &[ChangeRecord] {
        &self.local
    }

    /// Pending remote changes, oldest first.
    #[must_use]
    pub fn pending_remote(&self) -> &[ChangeRecord] {
        &self.remote
    }

    /// Unresolved conflicts, in detection order.
    #[must_use]
    pub fn conflicts(&self) -> &[ConflictRecord] {
        &self.conflicts
    }

    /// The conflict for `id`, if any.
    #[must_use]
    pub fn conflict(&self, id: &IssueId) -> Option<&ConflictRecord> {
        self.conflicts.iter().find(|c| &c.issue_id == id)
    }

    fn side(&self, source: ChangeSource) -> &Vec<ChangeRecord> {
        match source {
            ChangeSource::Local => &self.local,
            ChangeSource::Remote => &self.remote,
        }
    }

    fn side_mut(&mut self, source: ChangeSource) -> &mut Vec<ChangeRecord> {
        match source {
            ChangeSource::Local => &mut self.local,
            ChangeSource::Remote => &mut self.remote,
        }
    }

    /// State both sides started from: the `previous_state` of the earliest
    /// pending local change, else of the earliest pending remote change.
    fn merge_base(&self, id: &IssueId) -> Option<Issue> {
        let earliest = |records: &[ChangeRecord]| {
            records
                .iter()
                .find(|r| &r.issue_id == id)
                .and_then(|r| r.previous_state.clone())
        };
        earliest(&self.local).or_else(|| earliest(&self.remote))
    }

    /// Append a record and check the opposite side.
    ///
    /// Returns the conflict when this record creates one. If the issue is
    /// already in conflict, the existing record is refreshed with the newer
    /// change and `None` is returned.
    pub fn record(&mut self, record: ChangeRecord) -> Option<ConflictRecord> {
        let id = record.issue_id.clone();
        let source = record.source;
        self.side_mut(source).push(record.clone());

        let opposing = self
            .side(source.opposite())
            .iter()
            .rev()
            .find(|r| r.issue_id == id)
            .cloned()?;

        if let Some(existing) = self.conflicts.iter_mut().find(|c| c.issue_id == id) {
            match source {
                ChangeSource::Local => existing.local = record,
                ChangeSource::Remote => existing.remote = record,
            }
            return None;
        }

        let (local, remote) = match source {
            ChangeSource::Local => (record, opposing),
            ChangeSource::Remote => (opposing, record),
        };
        let conflict = ConflictRecord {
            base: self.merge_base(&id),
            issue_id: id,
            local,
            remote,
            detected_at: Utc::now(),
        };
        self.conflicts.push(conflict.clone());
        Some(conflict)
    }

    /// Drop every pending record and the conflict for `id`.
    ///
    /// Returns the removed conflict.
    pub fn settle(&mut self, id: &IssueId) -> Option<ConflictRecord> {
        self.local.retain(|r| &r.issue_id != id);
        self.remote.retain(|r| &r.issue_id != id);
        let pos = self.conflicts.iter().position(|c| &c.issue_id == id)?;
        Some(self.conflicts.remove(pos))
    }

    /// Remove and return pending records of `source` whose issue is not in
    /// conflict. Conflicted records stay until resolved.
    pub fn drain_unconflicted(&mut self, source: ChangeSource) -> Vec<ChangeRecord> {
        let conflicted: Vec<IssueId> = self.conflicts.iter().map(|c| c.issue_id.clone()).collect();
        let (keep, take): (Vec<_>, Vec<_>) = std::mem::take(self.side_mut(source))
            .into_iter()
            .partition(|r| conflicted.contains(&r.issue_id));
        *self.side_mut(source) = keep;
        take
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(id: &str) -> ChangeRecord {
        ChangeRecord::upsert(Issue::new(id, "local"), None, ChangeSource::Local)
    }

    fn remote(id: &str) -> ChangeRecord {
        ChangeRecord::upsert(Issue::new(id, "remote"), None, ChangeSource::Remote)
    }

    #[test]
    fn opposing_changes_create_one_conflict() {
        let mut log = ChangeLog::new();
        assert!(log.record(local("bd-1")).is_none());
        let conflict = log.record(remote("bd-1")).unwrap();
        assert_eq!(conflict.local.source, ChangeSource::Local);
        assert_eq!(conflict.remote.source, ChangeSource::Remote);

        // A further change refreshes the existing conflict.
        assert!(log.record(remote("bd-1")).is_none());
        assert_eq!(log.conflicts().len(), 1);
    }

    #[test]
    fn same_side_changes_do_not_conflict() {
        let mut log = ChangeLog::new();
        log.record(local("bd-1"));
        log.record(local("bd-1"));
        log.record(remote("bd-2"));
        assert!(log.conflicts().is_empty());
        assert_eq!(log.pending_local().len(), 2);
    }

    #[test]
    fn settle_clears_both_sides() {
        let mut log = ChangeLog::new();
        log.record(local("bd-1"));
        log.record(remote("bd-1"));
        log.record(local("bd-2"));

        assert!(log.settle(&IssueId::new("bd-1")).is_some());
        assert!(log.conflicts().is_empty());
        assert!(log.pending_remote().is_empty());
        assert_eq!(log.pending_local().len(), 1);
        assert!(log.settle(&IssueId::new("bd-1")).is_none());
    }

    #[test]
    fn drain_leaves_conflicted_records() {
        let mut log = ChangeLog::new();
        log.record(local("bd-1"));
        log.record(remote("bd-1"));
        log.record(local("bd-2"));

        let drained = log.drain_unconflicted(ChangeSource::Local);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].issue_id, IssueId::new("bd-2"));
        assert_eq!(log.pending_local().len(), 1);
    }

    #[test]
    fn effective_timestamp_prefers_updated_at() {
        let mut issue = Issue::new("bd-1", "t");
        issue.updated_at = "2020-01-01T00:00:00Z".parse().unwrap();
        let record = ChangeRecord::upsert(issue.clone(), None, ChangeSource::Local);
        assert_eq!(record.effective_timestamp(), issue.updated_at);

        let deleted = ChangeRecord::delete(issue, ChangeSource::Local);
        assert_eq!(deleted.effective_timestamp(), deleted.timestamp);
    }
}
