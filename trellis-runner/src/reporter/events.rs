// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events produced during a test run.
//!
//! Events are produced by a [`TestRunner`](crate::runner::TestRunner) and consumed by a
//! [`Reporter`](crate::reporter::Reporter).

use crate::discovery::TestFileList;
use camino::Utf8Path;
use chrono::{DateTime, FixedOffset};
use std::time::Duration;
use trellis_metadata::{CaseStatus, SnapshotSummary, SuiteOutcome, SuiteResult};

/// A test run event.
#[derive(Clone, Debug)]
pub struct RunEvent<'a> {
    /// The time at which the event was generated, including the offset from UTC.
    pub timestamp: DateTime<FixedOffset>,

    /// The amount of time elapsed since the start of the test run.
    pub elapsed: Duration,

    /// The kind of event this is.
    pub kind: RunEventKind<'a>,
}

/// The kind of a [`RunEvent`].
#[derive(Clone, Debug)]
pub enum RunEventKind<'a> {
    /// The test run started.
    RunStarted {
        /// The files that will be run.
        file_list: &'a TestFileList,

        /// The maximum number of units that run at the same time.
        test_threads: usize,
    },

    /// An execution unit was spawned for a file.
    UnitStarted {
        /// The test file.
        file: &'a Utf8Path,

        /// The number of units running, including this one.
        running: usize,
    },

    /// A unit produced output that is not part of its final report.
    UnitOutput {
        /// The test file.
        file: &'a Utf8Path,

        /// The kind of output.
        level: OutputLevel,

        /// The text of the output.
        message: String,
    },

    /// A unit finished, and its result is final.
    UnitFinished {
        /// The test file.
        file: &'a Utf8Path,

        /// The result for this file.
        result: SuiteResult,

        /// The number of units still running.
        running: usize,
    },

    /// The test run finished.
    RunFinished {
        /// The time at which the run was started.
        start_time: DateTime<FixedOffset>,

        /// The amount of time it took for the run to complete.
        elapsed: Duration,

        /// Statistics for the run.
        run_stats: RunStats,
    },
}

/// The kind of output forwarded from a unit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputLevel {
    /// A `log` message, or a line of standard output that is not part of the protocol.
    Log,

    /// An `info` message.
    Info,
}

/// Statistics for a test run.
///
/// Every file counts toward exactly one of `suites_passed`, `suites_failed` and `suites_empty`.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The total number of files that were expected to be run at the beginning.
    pub initial_file_count: usize,

    /// The number of files whose units finished.
    pub finished_file_count: usize,

    /// The number of suites in which every case passed or was skipped.
    pub suites_passed: usize,

    /// The number of suites with a failed case, a failed hook, or a unit failure.
    pub suites_failed: usize,

    /// The number of suites that reported no cases.
    pub suites_empty: usize,

    /// The number of units that ended without a usable report: they failed to load, crashed,
    /// timed out, or could not be spawned. These are also counted in `suites_failed`.
    pub unit_failures: usize,

    /// The number of cases that passed.
    pub cases_passed: usize,

    /// The number of cases that failed. Cases that never left the pending state count as failed.
    pub cases_failed: usize,

    /// The number of cases that were skipped.
    pub cases_skipped: usize,

    /// Snapshot activity across all files.
    pub snapshots: SnapshotSummary,

    /// The largest number of units that were running at the same time.
    pub peak_running: usize,
}

impl RunStats {
    /// Returns the total number of suites.
    pub fn suites_total(&self) -> usize {
        self.suites_passed + self.suites_failed + self.suites_empty
    }

    /// Returns the total number of cases.
    pub fn cases_total(&self) -> usize {
        self.cases_passed + self.cases_failed + self.cases_skipped
    }

    /// Returns true if this run is considered a success.
    ///
    /// A run is marked as failed if any of the following are true:
    /// * a file was not run to completion
    /// * any suite failed
    /// * any case failed
    pub fn is_success(&self) -> bool {
        self.initial_file_count == self.finished_file_count && !self.any_failed()
    }

    /// Returns true if any suites or cases failed.
    #[inline]
    pub fn any_failed(&self) -> bool {
        self.suites_failed > 0 || self.cases_failed > 0
    }

    pub(crate) fn on_unit_finished(&mut self, result: &SuiteResult) {
        self.finished_file_count += 1;
        match result.outcome() {
            SuiteOutcome::Passed => self.suites_passed += 1,
            SuiteOutcome::Failed => self.suites_failed += 1,
            SuiteOutcome::Empty => self.suites_empty += 1,
        }
        if result.error.is_some() {
            self.unit_failures += 1;
        }
        for case in &result.cases {
            match case.status {
                CaseStatus::Passed => self.cases_passed += 1,
                CaseStatus::Skipped => self.cases_skipped += 1,
                CaseStatus::Failed | CaseStatus::Pending => self.cases_failed += 1,
            }
        }
        self.snapshots += result.snapshots;
    }
}
