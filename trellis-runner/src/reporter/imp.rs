// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    events::{OutputLevel, RunEvent, RunEventKind, RunStats},
    helpers::Styles,
};
use crate::{
    errors::WriteEventError,
    helpers::{display_width, format_duration_secs, plural},
    write_str::WriteStr,
};
use camino::Utf8Path;
use itertools::Itertools;
use owo_colors::{OwoColorize, Style};
use std::{io, time::Duration};
use trellis_metadata::{CaseResult, CaseStatus, SuiteOutcome, SuiteResult};

/// Test reporter builder.
#[derive(Debug, Default)]
pub struct ReporterBuilder {
    should_colorize: bool,
    verbose: bool,
}

impl ReporterBuilder {
    /// Set to true if the reporter should colorize output.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Sets verbose output: unit starts and case durations are shown.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Creates a new test reporter.
    pub fn build<'a>(&self) -> Reporter<'a> {
        let mut styles = Styles::default();
        if self.should_colorize {
            styles.colorize();
        }
        Reporter {
            styles,
            verbose: self.verbose,
            failures: Vec::new(),
        }
    }
}

/// Writes a human-readable account of a test run.
///
/// Every file gets a status line followed by one line per case. Once the run is finished, the
/// failures are listed again, followed by the aggregate summary.
#[derive(Debug)]
pub struct Reporter<'a> {
    styles: Styles,
    verbose: bool,
    failures: Vec<FailureRecord<'a>>,
}

#[derive(Debug)]
struct FailureRecord<'a> {
    file: &'a Utf8Path,
    // None if the unit itself failed.
    case: Option<String>,
}

impl<'a> Reporter<'a> {
    /// Reports an event to the given writer.
    pub fn report_event(
        &mut self,
        event: &RunEvent<'a>,
        writer: &mut dyn WriteStr,
    ) -> Result<(), WriteEventError> {
        self.write_event_impl(event, writer)?;
        writer.write_str_flush()?;
        Ok(())
    }

    fn write_event_impl(
        &mut self,
        event: &RunEvent<'a>,
        writer: &mut dyn WriteStr,
    ) -> io::Result<()> {
        match &event.kind {
            RunEventKind::RunStarted {
                file_list,
                test_threads,
            } => {
                write!(writer, "{:>12} ", "Starting".style(self.styles.pass))?;
                writeln!(
                    writer,
                    "{} {} with up to {} {} at a time",
                    file_list.len().style(self.styles.count),
                    plural::files_str(file_list.len()),
                    test_threads.style(self.styles.count),
                    plural::units_str(*test_threads),
                )?;
            }
            RunEventKind::UnitStarted { file, .. } => {
                if self.verbose {
                    write!(writer, "{:>12} ", "START".style(self.styles.pass))?;
                    writeln!(writer, "{}", file.style(self.styles.file))?;
                }
            }
            RunEventKind::UnitOutput {
                file,
                level,
                message,
            } => {
                let label = match level {
                    OutputLevel::Log => "LOG",
                    OutputLevel::Info => "INFO",
                };
                write!(writer, "{:>12} ", label.style(self.styles.dim))?;
                writeln!(writer, "{}: {message}", file.style(self.styles.file))?;
            }
            RunEventKind::UnitFinished { file, result, .. } => {
                self.write_suite(file, result, writer)?;
                self.record_failures(*file, result);
            }
            RunEventKind::RunFinished {
                elapsed,
                run_stats,
                ..
            } => {
                self.write_failure_recap(writer)?;
                self.write_summary(run_stats, *elapsed, writer)?;
            }
        }
        Ok(())
    }

    fn write_suite(
        &self,
        file: &Utf8Path,
        result: &SuiteResult,
        writer: &mut dyn WriteStr,
    ) -> io::Result<()> {
        let (label, style) = match result.outcome() {
            SuiteOutcome::Passed => ("PASS", self.styles.pass),
            SuiteOutcome::Failed => ("FAIL", self.styles.fail),
            SuiteOutcome::Empty => ("EMPTY", self.styles.skip),
        };
        write!(writer, "{:>12} ", label.style(style))?;
        // * > means right-align.
        // * 8 is the number of characters to pad to.
        // * .3 means print three digits after the decimal point.
        write!(writer, "[{:>8.3}s] ", result.duration.as_secs_f64())?;
        writeln!(
            writer,
            "{} ({} {})",
            file.style(self.styles.file),
            result.cases.len().style(self.styles.count),
            plural::cases_str(result.cases.len()),
        )?;

        for case in &result.cases {
            self.write_case(case, writer)?;
        }

        if let Some(error) = &result.error {
            write!(writer, "{:>16} ", "ERROR".style(self.styles.fail))?;
            write_indented(writer, error, 17)?;
        }
        Ok(())
    }

    fn write_case(&self, case: &CaseResult, writer: &mut dyn WriteStr) -> io::Result<()> {
        let style = self.status_style(case.status);
        write!(writer, "{:>16} {}", case.status.style(style), case.full_name())?;
        if self.verbose {
            let duration = format!("({})", format_duration_secs(case.duration));
            write!(writer, " {}", duration.style(self.styles.dim))?;
        }
        writeln!(writer)?;

        if let Some(failure) = &case.failure {
            write!(writer, "{:>17}", "")?;
            write_indented(writer, &failure.message, 17)?;
            if let Some(stack) = &failure.stack {
                write!(writer, "{:>17}", "")?;
                let stack = stack.style(self.styles.dim).to_string();
                write_indented(writer, &stack, 17)?;
            }
        }
        Ok(())
    }

    fn status_style(&self, status: CaseStatus) -> Style {
        match status {
            CaseStatus::Passed => self.styles.pass,
            CaseStatus::Failed | CaseStatus::Pending => self.styles.fail,
            CaseStatus::Skipped => self.styles.skip,
        }
    }

    fn record_failures(&mut self, file: &'a Utf8Path, result: &SuiteResult) {
        if result.error.is_some() {
            self.failures.push(FailureRecord { file, case: None });
        }
        self.failures.extend(
            result
                .cases
                .iter()
                .filter(|case| !case.status.is_success())
                .map(|case| FailureRecord {
                    file,
                    case: Some(case.full_name()),
                }),
        );
    }

    fn write_failure_recap(&self, writer: &mut dyn WriteStr) -> io::Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        writeln!(writer)?;
        for failure in &self.failures {
            write!(writer, "{:>12} ", "FAIL".style(self.styles.fail))?;
            match &failure.case {
                Some(case) => writeln!(writer, "{}: {case}", failure.file.style(self.styles.file))?,
                None => writeln!(writer, "{}", failure.file.style(self.styles.file))?,
            }
        }
        Ok(())
    }

    fn write_summary(
        &self,
        run_stats: &RunStats,
        elapsed: Duration,
        writer: &mut dyn WriteStr,
    ) -> io::Result<()> {
        let mut lines = Vec::new();

        lines.push(self.summary_line(
            "Test Suites",
            &[
                (run_stats.suites_failed, "failed", self.styles.fail),
                (run_stats.suites_empty, "empty", self.styles.skip),
                (run_stats.suites_passed, "passed", self.styles.pass),
            ],
            run_stats.suites_total(),
        ));
        lines.push(self.summary_line(
            "Tests",
            &[
                (run_stats.cases_failed, "failed", self.styles.fail),
                (run_stats.cases_skipped, "skipped", self.styles.skip),
                (run_stats.cases_passed, "passed", self.styles.pass),
            ],
            run_stats.cases_total(),
        ));
        let snapshots = run_stats.snapshots;
        let snapshots_total = snapshots.created + snapshots.updated + snapshots.matched;
        if snapshots_total > 0 {
            lines.push(self.summary_line(
                "Snapshots",
                &[
                    (snapshots.created, "created", self.styles.pass),
                    (snapshots.updated, "updated", self.styles.pass),
                    (snapshots.matched, "passed", self.styles.pass),
                ],
                snapshots_total,
            ));
        }
        lines.push(format!(
            "{} {}",
            "Time:".style(self.styles.count),
            format_duration_secs(elapsed)
        ));

        let width = lines.iter().map(|line| display_width(line)).max().unwrap_or(0);
        writeln!(writer, "{}", "-".repeat(width))?;
        for line in lines {
            writeln!(writer, "{line}")?;
        }
        Ok(())
    }

    /// Produces a line like `Tests: 1 failed, 2 passed, 3 total`. Zero counts are left out.
    fn summary_line(&self, label: &str, parts: &[(usize, &str, Style)], total: usize) -> String {
        let counts = parts
            .iter()
            .filter(|(count, ..)| *count > 0)
            .map(|&(count, name, style)| format!("{count} {name}").style(style).to_string())
            .chain(std::iter::once(format!("{total} total")))
            .join(", ");
        format!("{} {counts}", format!("{label}:").style(self.styles.count))
    }
}

/// Writes `text`, indenting every line after the first by `indent` spaces.
fn write_indented(writer: &mut dyn WriteStr, text: &str, indent: usize) -> io::Result<()> {
    let mut lines = text.lines();
    if let Some(first) = lines.next() {
        writeln!(writer, "{first}")?;
    } else {
        writeln!(writer)?;
    }
    for line in lines {
        if line.is_empty() {
            writeln!(writer)?;
        } else {
            writeln!(writer, "{:indent$}{line}", "")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::TestFileList;
    use chrono::Local;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use trellis_metadata::{FailureDetail, SnapshotSummary};

    fn event<'a>(kind: RunEventKind<'a>) -> RunEvent<'a> {
        RunEvent {
            timestamp: Local::now().fixed_offset(),
            elapsed: Duration::ZERO,
            kind,
        }
    }

    fn case(suite_path: &[&str], name: &str, status: CaseStatus) -> CaseResult {
        CaseResult {
            id: name.to_owned(),
            name: name.to_owned(),
            suite_path: suite_path.iter().map(|s| (*s).to_owned()).collect(),
            status,
            failure: None,
            duration: Duration::from_millis(5),
        }
    }

    fn suite(file: &str, cases: Vec<CaseResult>) -> SuiteResult {
        SuiteResult {
            file: file.into(),
            suite: file.to_owned(),
            cases,
            snapshots: SnapshotSummary::default(),
            duration: Duration::from_millis(12),
            error: None,
        }
    }

    fn render(verbose: bool, results: Vec<SuiteResult>) -> String {
        let file_list = TestFileList::from_files(results.iter().map(|result| result.file.clone()));
        let mut reporter = ReporterBuilder::default().set_verbose(verbose).build();
        let mut out = String::new();
        let mut run_stats = RunStats {
            initial_file_count: file_list.len(),
            ..Default::default()
        };

        reporter
            .report_event(
                &event(RunEventKind::RunStarted {
                    file_list: &file_list,
                    test_threads: 2,
                }),
                &mut out,
            )
            .unwrap();
        for (file, result) in file_list.iter().zip(results) {
            run_stats.on_unit_finished(&result);
            reporter
                .report_event(
                    &event(RunEventKind::UnitFinished {
                        file,
                        result,
                        running: 0,
                    }),
                    &mut out,
                )
                .unwrap();
        }
        reporter
            .report_event(
                &event(RunEventKind::RunFinished {
                    start_time: Local::now().fixed_offset(),
                    elapsed: Duration::from_millis(1500),
                    run_stats,
                }),
                &mut out,
            )
            .unwrap();
        out
    }

    #[test]
    fn one_failing_file() {
        let mut failing = case(&["b.test"], "divides", CaseStatus::Failed);
        failing.failure = Some(
            FailureDetail::new("Expected: 2\nReceived: 3").with_stack("at src/lib.rs:10:5"),
        );
        let out = render(
            false,
            vec![
                suite(
                    "a.test",
                    vec![
                        case(&["a.test"], "adds", CaseStatus::Passed),
                        case(&["a.test", "nested"], "subtracts", CaseStatus::Passed),
                    ],
                ),
                suite("b.test", vec![failing]),
            ],
        );

        assert_eq!(
            out,
            indoc! {"
                    Starting 2 files with up to 2 units at a time
                        PASS [   0.012s] a.test (2 cases)
                            PASS a.test > adds
                            PASS a.test > nested > subtracts
                        FAIL [   0.012s] b.test (1 case)
                            FAIL b.test > divides
                                 Expected: 2
                                 Received: 3
                                 at src/lib.rs:10:5

                        FAIL b.test: b.test > divides
                ----------------------------------------
                Test Suites: 1 failed, 1 passed, 2 total
                Tests: 1 failed, 2 passed, 3 total
                Time: 1.500s
            "}
        );
    }

    #[test]
    fn unit_failures_empty_suites_and_snapshots() {
        let mut with_snapshots = suite(
            "a.test",
            vec![
                case(&["a.test"], "renders", CaseStatus::Passed),
                case(&["a.test"], "later", CaseStatus::Skipped),
            ],
        );
        with_snapshots.snapshots = SnapshotSummary {
            created: 1,
            updated: 0,
            matched: 2,
        };
        let mut crashed = SuiteResult::unit_failure(
            "b.test",
            "unit exited with code 3 without reporting results\n\nstderr:\nboom",
        );
        crashed.duration = Duration::from_millis(12);
        let out = render(
            true,
            vec![with_snapshots, crashed, suite("c.test", Vec::new())],
        );

        assert_eq!(
            out,
            indoc! {"
                    Starting 3 files with up to 2 units at a time
                        PASS [   0.012s] a.test (2 cases)
                            PASS a.test > renders (0.005s)
                            SKIP a.test > later (0.005s)
                        FAIL [   0.012s] b.test (0 cases)
                           ERROR unit exited with code 3 without reporting results

                                 stderr:
                                 boom
                       EMPTY [   0.012s] c.test (0 cases)

                        FAIL b.test
                -------------------------------------------------
                Test Suites: 1 failed, 1 empty, 1 passed, 3 total
                Tests: 1 skipped, 1 passed, 2 total
                Snapshots: 1 created, 2 passed, 3 total
                Time: 1.500s
            "}
        );
    }

    #[test]
    fn forwarded_output() {
        let mut reporter = ReporterBuilder::default().build();
        let mut out = String::new();
        reporter
            .report_event(
                &event(RunEventKind::UnitOutput {
                    file: Utf8Path::new("a.test"),
                    level: OutputLevel::Info,
                    message: "connected".to_owned(),
                }),
                &mut out,
            )
            .unwrap();
        assert_eq!(out, "        INFO a.test: connected\n");
    }

    #[test]
    fn colorized_summary_width_ignores_escapes() {
        let mut reporter = ReporterBuilder::default().set_colorize(true).build();
        let mut out = String::new();
        let run_stats = RunStats {
            initial_file_count: 1,
            finished_file_count: 1,
            suites_passed: 1,
            cases_passed: 1,
            ..Default::default()
        };
        reporter
            .report_event(
                &event(RunEventKind::RunFinished {
                    start_time: Local::now().fixed_offset(),
                    elapsed: Duration::ZERO,
                    run_stats,
                }),
                &mut out,
            )
            .unwrap();

        let separator = out.lines().next().unwrap();
        assert_eq!(separator, "-".repeat("Test Suites: 1 passed, 1 total".len()));
    }
}
