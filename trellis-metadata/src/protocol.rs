// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// A message sent by an execution unit to the coordinator.
///
/// Messages are serialized as a single line of JSON each, internally tagged by `type`. A unit
/// sends any number of [`Log`](Self::Log) and [`Info`](Self::Info) messages, followed by exactly
/// one terminal message: [`Done`](Self::Done) or [`Error`](Self::Error).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UnitMessage {
    /// Diagnostic output produced while the file was running.
    Log {
        /// The text of the message.
        message: String,
    },

    /// Informational output produced while the file was running.
    Info {
        /// The text of the message.
        message: String,
    },

    /// The file failed to load, or its tree failed outside of case handling.
    ///
    /// This is a terminal message.
    Error {
        /// A description of the failure.
        message: String,
    },

    /// The file ran to completion.
    ///
    /// This is a terminal message.
    Done {
        /// The results for the file. Units built with `trellis-harness` always send exactly one.
        results: Vec<SuiteResult>,
    },
}

// Messages are internally tagged, so the tag is always serialized first.
const MESSAGE_PREFIX: &str = "{\"type\":";

impl UnitMessage {
    /// Parses a single line of unit output.
    ///
    /// Returns `None` if the line is not a protocol message. Such lines are regular output
    /// written by the code under test.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str(line).ok()
    }

    /// Splits a line of unit output into regular output and a protocol message.
    ///
    /// A message may follow output that did not end in a newline, as in
    /// `progress...{"type":"done","results":[]}`. The leading text is returned as output; it is
    /// empty if the whole line is a message.
    pub fn split_line(line: &str) -> (&str, Option<Self>) {
        if let Some(message) = Self::parse_line(line) {
            return ("", Some(message));
        }
        line.match_indices(MESSAGE_PREFIX)
            .filter(|&(start, _)| start > 0)
            .find_map(|(start, _)| {
                Self::parse_line(&line[start..]).map(|message| (&line[..start], Some(message)))
            })
            .unwrap_or((line, None))
    }

    /// Serializes this message as a single line of JSON, without a trailing newline.
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).expect("unit messages are always serializable")
    }

    /// Returns true if this message ends the unit's report.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Error { .. } | Self::Done { .. } => true,
            Self::Log { .. } | Self::Info { .. } => false,
        }
    }
}

/// The externally visible report of one test file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SuiteResult {
    /// The path of the test file.
    pub file: Utf8PathBuf,

    /// The name of the file's root suite.
    pub suite: String,

    /// Case outcomes, in declared tree order.
    pub cases: Vec<CaseResult>,

    /// Snapshot activity during the run of this file.
    #[serde(default)]
    pub snapshots: SnapshotSummary,

    /// The time taken to execute the tree.
    #[serde(default)]
    pub duration: Duration,

    /// Set if the file could not be run to completion: it failed to load, crashed, or timed out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SuiteResult {
    /// Creates a failed result for a file that did not produce a report of its own.
    pub fn unit_failure(file: impl Into<Utf8PathBuf>, error: impl Into<String>) -> Self {
        let file = file.into();
        let suite = suite_name_for(&file);
        Self {
            file,
            suite,
            cases: Vec::new(),
            snapshots: SnapshotSummary::default(),
            duration: Duration::ZERO,
            error: Some(error.into()),
        }
    }

    /// Folds several results reported for the same file into one.
    ///
    /// Cases are concatenated in order, and the suite name of the first result is kept. Returns
    /// `None` if `results` is empty.
    pub fn fold(results: impl IntoIterator<Item = SuiteResult>) -> Option<Self> {
        let mut iter = results.into_iter();
        let mut first = iter.next()?;
        for next in iter {
            first.cases.extend(next.cases);
            first.snapshots += next.snapshots;
            first.duration += next.duration;
            first.error = match (first.error.take(), next.error) {
                (Some(a), Some(b)) => Some(format!("{a}\n{b}")),
                (a, b) => a.or(b),
            };
        }
        Some(first)
    }

    /// Classifies this result for aggregation.
    pub fn outcome(&self) -> SuiteOutcome {
        if self.error.is_some() {
            SuiteOutcome::Failed
        } else if self.cases.is_empty() {
            SuiteOutcome::Empty
        } else if self.cases.iter().all(|case| case.status.is_success()) {
            SuiteOutcome::Passed
        } else {
            SuiteOutcome::Failed
        }
    }

    /// Returns the number of cases with the given status.
    pub fn count(&self, status: CaseStatus) -> usize {
        self.cases.iter().filter(|case| case.status == status).count()
    }
}

/// The default suite name for a file: its file name.
pub fn suite_name_for(file: &Utf8Path) -> String {
    file.file_name().unwrap_or(file.as_str()).to_owned()
}

/// How a [`SuiteResult`] counts towards the aggregate.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SuiteOutcome {
    /// At least one case ran, and every case passed or was skipped.
    Passed,

    /// A case failed, or the file could not be run to completion.
    Failed,

    /// No cases ran, typically because filters excluded all of them.
    ///
    /// Empty suites count towards the suite total only.
    Empty,
}

/// The outcome of a single case.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CaseResult {
    /// A generated identifier, unique within the run.
    pub id: String,

    /// The display name of the case.
    pub name: String,

    /// Names of the enclosing suites, outermost first. Includes the file's root suite.
    pub suite_path: Vec<String>,

    /// The final status.
    pub status: CaseStatus,

    /// Failure detail, present if and only if the case failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,

    /// The time taken by the case, including its hooks.
    #[serde(default)]
    pub duration: Duration,
}

impl CaseResult {
    /// Returns the full name of the case: suite path and case name joined with ` > `.
    pub fn full_name(&self) -> String {
        let mut out = String::new();
        for suite in &self.suite_path {
            out.push_str(suite);
            out.push_str(" > ");
        }
        out.push_str(&self.name);
        out
    }
}

/// The status of a case.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseStatus {
    /// Declared, but not yet run.
    Pending,
    /// The body and its hooks completed without error.
    Passed,
    /// The body or one of its hooks failed.
    Failed,
    /// The case was declared as skipped, or was short-circuited by a hook failure.
    Skipped,
}

impl CaseStatus {
    /// Returns true for statuses that don't fail a suite.
    pub fn is_success(self) -> bool {
        match self {
            Self::Passed | Self::Skipped => true,
            Self::Pending | Self::Failed => false,
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.pad("PENDING"),
            Self::Passed => f.pad("PASS"),
            Self::Failed => f.pad("FAIL"),
            Self::Skipped => f.pad("SKIP"),
        }
    }
}

/// Information about why a case failed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// A human-readable message, possibly spanning several lines.
    pub message: String,

    /// Where the failure originated, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl FailureDetail {
    /// Creates a new failure detail without a stack.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    /// Attaches a stack description.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// Counts of snapshot comparisons performed by a file.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    /// Snapshots written for the first time.
    pub created: usize,
    /// Snapshots overwritten in update mode.
    pub updated: usize,
    /// Snapshots that matched the stored value.
    pub matched: usize,
}

impl std::ops::AddAssign for SnapshotSummary {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.matched += other.matched;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn case(name: &str, status: CaseStatus) -> CaseResult {
        CaseResult {
            id: name.to_owned(),
            name: name.to_owned(),
            suite_path: vec!["root".to_owned()],
            status,
            failure: None,
            duration: Duration::ZERO,
        }
    }

    fn suite(cases: Vec<CaseResult>) -> SuiteResult {
        SuiteResult {
            file: "tests/a.test".into(),
            suite: "a.test".to_owned(),
            cases,
            snapshots: SnapshotSummary::default(),
            duration: Duration::ZERO,
            error: None,
        }
    }

    #[test]
    fn message_line_format() {
        let message = UnitMessage::Log {
            message: "hello".to_owned(),
        };
        assert_eq!(message.to_line(), r#"{"type":"log","message":"hello"}"#);
        assert_eq!(UnitMessage::parse_line(&message.to_line()), Some(message));
    }

    #[test_case("plain output" ; "plain text")]
    #[test_case("{not json" ; "broken json")]
    #[test_case(r#"{"type":"unknown"}"# ; "unknown tag")]
    #[test_case("" ; "empty line")]
    fn non_protocol_lines(line: &str) {
        assert_eq!(UnitMessage::parse_line(line), None);
        assert_eq!(UnitMessage::split_line(line), (line, None));
    }

    #[test]
    fn message_after_unterminated_output() {
        let done = UnitMessage::Done { results: vec![] };
        let line = format!("progress...{}", done.to_line());
        assert_eq!(
            UnitMessage::split_line(&line),
            ("progress...", Some(done.clone()))
        );

        // Text that merely looks like the start of a message is kept as output.
        let line = format!(r#"saw {{"type": oops {}"#, done.to_line());
        assert_eq!(
            UnitMessage::split_line(&line),
            (r#"saw {"type": oops "#, Some(done.clone()))
        );

        assert_eq!(UnitMessage::split_line(&done.to_line()), ("", Some(done)));
    }

    #[test]
    fn done_message_parses() {
        let line = r#"{"type":"done","results":[{"file":"a.test","suite":"a","cases":[]}]}"#;
        let message = UnitMessage::parse_line(line).expect("done message parses");
        assert!(message.is_terminal());
        let UnitMessage::Done { results } = message else {
            panic!("expected done message");
        };
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome(), SuiteOutcome::Empty);
    }

    #[test]
    fn suite_outcomes() {
        assert_eq!(suite(vec![]).outcome(), SuiteOutcome::Empty);
        assert_eq!(
            suite(vec![
                case("a", CaseStatus::Passed),
                case("b", CaseStatus::Skipped)
            ])
            .outcome(),
            SuiteOutcome::Passed
        );
        assert_eq!(
            suite(vec![
                case("a", CaseStatus::Passed),
                case("b", CaseStatus::Failed)
            ])
            .outcome(),
            SuiteOutcome::Failed
        );
        assert_eq!(
            SuiteResult::unit_failure("tests/crash.test", "exited with code 3").outcome(),
            SuiteOutcome::Failed
        );
    }

    #[test]
    fn fold_results() {
        let mut first = suite(vec![case("a", CaseStatus::Passed)]);
        first.snapshots.created = 1;
        let mut second = suite(vec![case("b", CaseStatus::Failed)]);
        second.suite = "other".to_owned();
        second.snapshots.matched = 2;

        let folded = SuiteResult::fold([first, second]).expect("non-empty");
        assert_eq!(folded.suite, "a.test");
        assert_eq!(folded.cases.len(), 2);
        assert_eq!(
            folded.snapshots,
            SnapshotSummary {
                created: 1,
                updated: 0,
                matched: 2
            }
        );
        assert_eq!(SuiteResult::fold(Vec::new()), None);
    }

    #[test]
    fn full_name() {
        let mut result = case("adds", CaseStatus::Passed);
        result.suite_path.push("math".to_owned());
        assert_eq!(result.full_name(), "root > math > adds");
    }
}
