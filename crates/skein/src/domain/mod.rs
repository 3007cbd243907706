//! Domain types for issue tracking.
//!
//! Issues are persisted one per line in JSONL store files. The field names
//! follow the beads on-disk format so existing stores load unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Unique identifier for an issue
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(pub String);

impl IssueId {
    /// Create a new issue ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for IssueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IssueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Represents an issue in the tracking system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Unique identifier for the issue
    pub id: IssueId,

    /// Issue title
    pub title: String,

    /// Issue description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Current status
    pub status: IssueStatus,

    /// Priority level (0 = critical, 4 = trivial)
    pub priority: u8,

    /// Issue type
    #[serde(default)]
    pub issue_type: IssueType,

    /// Labels
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,

    /// Dependencies on other issues
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    /// External reference (the linked GitHub issue URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Closed timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Issue {
    /// Create an open issue with default priority (2) and type (task).
    pub fn new(id: impl Into<IssueId>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: IssueStatus::Open,
            priority: DEFAULT_PRIORITY,
            issue_type: IssueType::Task,
            labels: BTreeSet::new(),
            dependencies: Vec::new(),
            external_ref: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    /// Builder-style: set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Builder-style: set the status (sets `closed_at` when closing).
    #[must_use]
    pub fn with_status(mut self, status: IssueStatus) -> Self {
        self.status = status;
        if status == IssueStatus::Closed && self.closed_at.is_none() {
            self.closed_at = Some(self.updated_at);
        }
        self
    }

    /// Builder-style: add a `blocks` dependency on `to`.
    #[must_use]
    pub fn depends_on(mut self, to: impl Into<IssueId>) -> Self {
        let dep = Dependency::new(self.id.clone(), to.into(), DependencyType::Blocks);
        self.dependencies.push(dep);
        self
    }

    /// Returns `true` if the issue is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.status == IssueStatus::Closed
    }

    /// Validate invariants that must hold for a stored issue.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.as_str().trim().is_empty() {
            return Err("issue id cannot be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err(format!("issue {} has an empty title", self.id));
        }
        if self.priority > MAX_PRIORITY {
            return Err(format!(
                "issue {} has priority {} (expected 0-{MAX_PRIORITY})",
                self.id, self.priority
            ));
        }
        Ok(())
    }
}

/// Lowest-urgency priority value.
pub const MAX_PRIORITY: u8 = 4;

/// Priority assigned when nothing else is known.
pub const DEFAULT_PRIORITY: u8 = 2;

/// Status of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    /// Issue is open and ready to work on
    Open,

    /// Issue is currently being worked on
    InProgress,

    /// Issue has been completed
    Closed,
}

impl IssueStatus {
    /// Wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    /// Bug fix
    Bug,

    /// New feature
    Feature,

    /// General task
    #[default]
    Task,

    /// Epic (parent issue)
    Epic,

    /// Maintenance/chore
    Chore,
}

impl IssueType {
    /// Every issue type, in declaration order.
    pub const ALL: [IssueType; 5] = [
        IssueType::Bug,
        IssueType::Feature,
        IssueType::Task,
        IssueType::Epic,
        IssueType::Chore,
    ];

    /// Wire name of the type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Task => "task",
            Self::Epic => "epic",
            Self::Chore => "chore",
        }
    }

    /// Parse a wire name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dependency between issues: `issue_id` depends on `depends_on_id`.
///
/// `depends_on_id` must complete before `issue_id` can start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// The dependent issue (edge source)
    #[serde(alias = "from_id")]
    pub issue_id: IssueId,

    /// The issue being depended upon (edge target)
    #[serde(alias = "to_id")]
    pub depends_on_id: IssueId,

    /// Type of dependency
    #[serde(rename = "type")]
    pub dep_type: DependencyType,

    /// When the dependency was recorded
    pub created_at: DateTime<Utc>,
}

impl Dependency {
    /// Create a dependency stamped with the current time.
    #[must_use]
    pub fn new(issue_id: IssueId, depends_on_id: IssueId, dep_type: DependencyType) -> Self {
        Self {
            issue_id,
            depends_on_id,
            dep_type,
            created_at: Utc::now(),
        }
    }
}

/// Type of dependency relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyType {
    /// Hard blocker - prevents work
    Blocks,

    /// Hierarchical - epic to task
    ParentChild,

    /// Soft link - informational
    Related,

    /// Found during work
    DiscoveredFrom,
}

impl DependencyType {
    /// Returns `true` for relationships that impose an ordering (and can block).
    ///
    /// `related` and `discovered-from` are informational and never become
    /// graph edges.
    #[must_use]
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Blocks | Self::ParentChild)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_round_trips_through_beads_format() {
        let line = r#"{"id":"bd-2","title":"Write docs","status":"in_progress","priority":1,"issue_type":"feature","labels":["docs"],"dependencies":[{"issue_id":"bd-2","depends_on_id":"bd-1","type":"blocks","created_at":"2025-01-01T00:00:00Z"}],"created_at":"2025-01-01T00:00:00Z","updated_at":"2025-01-02T00:00:00Z"}"#;

        let issue: Issue = serde_json::from_str(line).unwrap();
        assert_eq!(issue.status, IssueStatus::InProgress);
        assert_eq!(issue.issue_type, IssueType::Feature);
        assert_eq!(issue.dependencies[0].depends_on_id, IssueId::new("bd-1"));
        assert!(issue.labels.contains("docs"));

        let again: Issue = serde_json::from_str(&serde_json::to_string(&issue).unwrap()).unwrap();
        assert_eq!(again, issue);
    }

    #[test]
    fn dependency_accepts_from_to_aliases() {
        let dep: Dependency = serde_json::from_str(
            r#"{"from_id":"a","to_id":"b","type":"parent-child","created_at":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(dep.issue_id, IssueId::new("a"));
        assert_eq!(dep.depends_on_id, IssueId::new("b"));
        assert!(dep.dep_type.is_ordering());
    }

    #[test]
    fn missing_type_defaults_to_task() {
        let issue: Issue = serde_json::from_str(
            r#"{"id":"bd-1","title":"t","status":"open","priority":2,"created_at":"2025-01-01T00:00:00Z","updated_at":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(issue.issue_type, IssueType::Task);
        assert!(issue.description.is_none());
    }

    #[test]
    fn validate_rejects_out_of_range_priority() {
        let issue = Issue::new("bd-1", "Title").with_priority(7);
        assert!(issue.validate().is_err());
        assert!(Issue::new("bd-1", "Title").validate().is_ok());
    }

    #[test]
    fn issue_type_parse_is_case_insensitive() {
        assert_eq!(IssueType::parse("Bug"), Some(IssueType::Bug));
        assert_eq!(IssueType::parse("unknown"), None);
    }
}
