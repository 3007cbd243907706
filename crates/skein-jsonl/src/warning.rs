//! Non-fatal problems found while loading a JSONL file.
//!
//! Resilient loading keeps going when a single line is bad. Each skipped line
//! is reported as a [`Warning`] carrying its 1-based line number so callers
//! can surface data-quality problems without losing the rest of the file.

use std::fmt;

/// A non-fatal warning that occurred during JSONL processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A line contained JSON that could not be parsed into the target type.
    MalformedJson {
        /// The 1-based line number where the error occurred.
        line_number: usize,
        /// A description of the parse error.
        error: String,
    },

    /// A line was skipped for a reason other than malformed JSON.
    SkippedLine {
        /// The 1-based line number that was skipped.
        line_number: usize,
        /// The reason the line was skipped.
        reason: String,
    },
}

impl Warning {
    /// Returns the line number associated with this warning.
    #[must_use]
    pub fn line_number(&self) -> usize {
        match self {
            Self::MalformedJson { line_number, .. } | Self::SkippedLine { line_number, .. } => {
                *line_number
            }
        }
    }

    /// Short machine-friendly name of the warning kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedJson { .. } => "malformed_json",
            Self::SkippedLine { .. } => "skipped_line",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedJson { line_number, error } => {
                write!(f, "line {line_number}: malformed JSON: {error}")
            }
            Self::SkippedLine {
                line_number,
                reason,
            } => write!(f, "line {line_number}: skipped: {reason}"),
        }
    }
}

impl std::error::Error for Warning {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_line_number_and_reason() {
        let warning = Warning::MalformedJson {
            line_number: 5,
            error: "unexpected end of input".to_string(),
        };
        let text = warning.to_string();
        assert!(text.contains("line 5"));
        assert!(text.contains("unexpected end of input"));
        assert_eq!(warning.line_number(), 5);
        assert_eq!(warning.kind(), "malformed_json");
    }

    #[test]
    fn skipped_line_reports_kind() {
        let warning = Warning::SkippedLine {
            line_number: 2,
            reason: "not an object".to_string(),
        };
        assert_eq!(warning.kind(), "skipped_line");
        assert_eq!(warning.line_number(), 2);
    }
}
