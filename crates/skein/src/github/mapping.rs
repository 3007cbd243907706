//! Field mapping between local issues and GitHub issues.
//!
//! Pure functions only. Priority and type travel as prefixed labels
//! (`priority:high`, `type:bug` with the default prefixes); the local issue
//! id travels as an HTML comment marker in the body:
//!
//! ```text
//! Fix the flaky test.
//!
//! <!-- beads-id: bd-a1b2 -->
//! ```

use super::transport::RemoteState;
use crate::config::GitHubConfig;
use crate::domain::{DEFAULT_PRIORITY, Issue, IssueStatus, IssueType, MAX_PRIORITY};
use std::collections::BTreeSet;

const MARKER_OPEN: &str = "<!-- beads-id:";
const MARKER_CLOSE: &str = "-->";

/// Label names by priority, 0 (critical) to 4 (trivial).
const PRIORITY_NAMES: [&str; 5] = ["critical", "high", "medium", "low", "trivial"];

/// GitHub state for a local status. Only `closed` closes the remote issue.
#[must_use]
pub fn to_remote_state(status: IssueStatus) -> RemoteState {
    match status {
        IssueStatus::Closed => RemoteState::Closed,
        IssueStatus::Open | IssueStatus::InProgress => RemoteState::Open,
    }
}

/// Local status for a GitHub state.
///
/// An open remote issue keeps a local `in_progress` status, since GitHub
/// cannot express it.
#[must_use]
pub fn from_remote_state(state: RemoteState, local: Option<IssueStatus>) -> IssueStatus {
    match (state, local) {
        (RemoteState::Closed, _) => IssueStatus::Closed,
        (RemoteState::Open, Some(IssueStatus::InProgress)) => IssueStatus::InProgress,
        (RemoteState::Open, _) => IssueStatus::Open,
    }
}

/// Label for a priority, e.g. `priority:high` for 1.
#[must_use]
pub fn priority_label(priority: u8, prefix: &str) -> String {
    let index = usize::from(priority.min(MAX_PRIORITY));
    format!("{prefix}{}", PRIORITY_NAMES[index])
}

/// Priority carried by a single label, if it is a priority label.
#[must_use]
pub fn parse_priority_label(label: &str, prefix: &str) -> Option<u8> {
    let name = label.strip_prefix(prefix)?;
    PRIORITY_NAMES
        .iter()
        .position(|p| p.eq_ignore_ascii_case(name.trim()))
        .and_then(|i| u8::try_from(i).ok())
}

/// Priority from a label set; `medium` when none is recognized.
pub fn priority_from_labels<'a>(labels: impl IntoIterator<Item = &'a str>, prefix: &str) -> u8 {
    labels
        .into_iter()
        .find_map(|l| parse_priority_label(l, prefix))
        .unwrap_or(DEFAULT_PRIORITY)
}

/// Label for an issue type, e.g. `type:bug`.
#[must_use]
pub fn type_label(issue_type: IssueType, prefix: &str) -> String {
    format!("{prefix}{issue_type}")
}

/// Type from a label set; `task` when none is recognized.
pub fn type_from_labels<'a>(labels: impl IntoIterator<Item = &'a str>, prefix: &str) -> IssueType {
    labels
        .into_iter()
        .filter_map(|l| l.strip_prefix(prefix))
        .find_map(IssueType::parse)
        .unwrap_or_default()
}

/// Returns `true` for labels owned by the priority/type mapping.
#[must_use]
pub fn is_mapped_label(label: &str, config: &GitHubConfig) -> bool {
    label.starts_with(&config.priority_prefix) || label.starts_with(&config.type_prefix)
}

/// Full GitHub label set for a local issue: priority, type, then the
/// issue's own labels.
#[must_use]
pub fn issue_labels(issue: &Issue, config: &GitHubConfig) -> BTreeSet<String> {
    let mut labels: BTreeSet<String> = issue
        .labels
        .iter()
        .filter(|l| !is_mapped_label(l, config))
        .cloned()
        .collect();
    labels.insert(priority_label(issue.priority, &config.priority_prefix));
    labels.insert(type_label(issue.issue_type, &config.type_prefix));
    labels
}

/// Local view of a GitHub label set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedLabels {
    /// Priority from the priority label
    pub priority: u8,
    /// Type from the type label
    pub issue_type: IssueType,
    /// Every label that is not a priority or type label
    pub labels: BTreeSet<String>,
}

/// Separate mapped labels from plain labels.
pub fn split_labels<'a>(
    labels: impl IntoIterator<Item = &'a str> + Clone,
    config: &GitHubConfig,
) -> MappedLabels {
    MappedLabels {
        priority: priority_from_labels(labels.clone(), &config.priority_prefix),
        issue_type: type_from_labels(labels.clone(), &config.type_prefix),
        labels: labels
            .into_iter()
            .filter(|l| !is_mapped_label(l, config))
            .map(str::to_string)
            .collect(),
    }
}

/// Body with `id` embedded as a marker, replacing any existing marker.
#[must_use]
pub fn add_beads_id_to_body(body: &str, id: &str) -> String {
    let stripped = strip_beads_id_from_body(body);
    let marker = format!("{MARKER_OPEN} {id} {MARKER_CLOSE}");
    if stripped.is_empty() {
        marker
    } else {
        format!("{stripped}\n\n{marker}")
    }
}

/// The id in the first marker of `body`, if any.
#[must_use]
pub fn extract_beads_id_from_body(body: &str) -> Option<String> {
    let start = body.find(MARKER_OPEN)? + MARKER_OPEN.len();
    let rest = &body[start..];
    let end = rest.find(MARKER_CLOSE)?;
    let id = rest[..end].trim();
    if id.is_empty() || id.contains(char::is_whitespace) {
        return None;
    }
    Some(id.to_string())
}

/// Body with every marker removed and trailing whitespace trimmed.
#[must_use]
pub fn strip_beads_id_from_body(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    while let Some(start) = rest.find(MARKER_OPEN) {
        out.push_str(&rest[..start]);
        match rest[start..].find(MARKER_CLOSE) {
            Some(end) => rest = &rest[start + end + MARKER_CLOSE.len()..],
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "priority:critical")]
    #[case(1, "priority:high")]
    #[case(2, "priority:medium")]
    #[case(3, "priority:low")]
    #[case(4, "priority:trivial")]
    fn priority_labels_round_trip(#[case] priority: u8, #[case] label: &str) {
        assert_eq!(priority_label(priority, "priority:"), label);
        assert_eq!(priority_from_labels([label], "priority:"), priority);
    }

    #[test]
    fn priority_prefix_is_configurable() {
        assert_eq!(priority_label(1, "P-"), "P-high");
        assert_eq!(priority_from_labels(["P-low"], "P-"), 3);
        assert_eq!(priority_from_labels(["priority:low"], "P-"), DEFAULT_PRIORITY);
    }

    #[test]
    fn unrecognized_labels_default_to_medium_task() {
        let labels = ["priority:urgent", "type:story", "help wanted"];
        assert_eq!(priority_from_labels(labels, "priority:"), 2);
        assert_eq!(type_from_labels(labels, "type:"), IssueType::Task);
    }

    #[test]
    fn split_separates_plain_labels() {
        let config = GitHubConfig::default();
        let mapped = split_labels(["type:bug", "priority:high", "ui", "good first issue"], &config);
        assert_eq!(mapped.priority, 1);
        assert_eq!(mapped.issue_type, IssueType::Bug);
        assert_eq!(
            mapped.labels.into_iter().collect::<Vec<_>>(),
            vec!["good first issue", "ui"]
        );
    }

    #[test]
    fn issue_labels_replace_stale_mapped_labels() {
        let config = GitHubConfig::default();
        let mut issue = Issue::new("bd-1", "t").with_priority(0);
        issue.labels.insert("priority:low".into());
        issue.labels.insert("backend".into());

        let labels: Vec<String> = issue_labels(&issue, &config).into_iter().collect();
        assert_eq!(labels, vec!["backend", "priority:critical", "type:task"]);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(to_remote_state(IssueStatus::InProgress), RemoteState::Open);
        assert_eq!(to_remote_state(IssueStatus::Closed), RemoteState::Closed);
        assert_eq!(
            from_remote_state(RemoteState::Open, Some(IssueStatus::InProgress)),
            IssueStatus::InProgress
        );
        assert_eq!(
            from_remote_state(RemoteState::Open, Some(IssueStatus::Closed)),
            IssueStatus::Open
        );
        assert_eq!(from_remote_state(RemoteState::Closed, None), IssueStatus::Closed);
    }

    #[test]
    fn marker_round_trips_and_replaces() {
        let body = add_beads_id_to_body("Some description", "bd-a1b2");
        assert_eq!(extract_beads_id_from_body(&body).as_deref(), Some("bd-a1b2"));

        let again = add_beads_id_to_body(&body, "bd-zz99");
        assert_eq!(again.matches(MARKER_OPEN).count(), 1);
        assert_eq!(extract_beads_id_from_body(&again).as_deref(), Some("bd-zz99"));
        assert!(again.starts_with("Some description\n\n"));
    }

    #[rstest]
    #[case("<!-- beads-id: bd-a1b2.1 -->", Some("bd-a1b2.1"))]
    #[case("text\n<!-- beads-id:bd-x-->", Some("bd-x"))]
    #[case("no marker here", None)]
    #[case("<!-- beads-id:  -->", None)]
    #[case("<!-- beads-id: unterminated", None)]
    fn extract_cases(#[case] body: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_beads_id_from_body(body).as_deref(), expected);
    }

    #[test]
    fn empty_body_gets_bare_marker_and_strip_removes_it() {
        let body = add_beads_id_to_body("", "bd-1");
        assert_eq!(body, "<!-- beads-id: bd-1 -->");
        assert_eq!(strip_beads_id_from_body(&body), "");
        assert_eq!(
            strip_beads_id_from_body("Keep me\n\n<!-- beads-id: bd-1 -->\n"),
            "Keep me"
        );
    }
}
