// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatcher for the test runner.
//!
//! The dispatcher is the central point of coordination for a test run: it receives events from
//! every executing unit, keeps the counters, and forwards events to the reporter callback. It is
//! the only component that sees the order in which units start and finish.

use super::ExecutorEvent;
use crate::{
    discovery::TestFileList,
    reporter::events::{RunEvent, RunEventKind, RunStats},
    time::{StopwatchStart, stopwatch},
};
use debug_ignore::DebugIgnore;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

#[derive(Debug)]
pub(super) struct DispatcherContext<F> {
    callback: DebugIgnore<F>,
    stopwatch: StopwatchStart,
    test_threads: usize,
    running: usize,
    run_stats: RunStats,
}

impl<'a, F> DispatcherContext<F>
where
    F: FnMut(RunEvent<'a>),
{
    pub(super) fn new(callback: F, initial_file_count: usize, test_threads: usize) -> Self {
        Self {
            callback: DebugIgnore(callback),
            stopwatch: stopwatch(),
            test_threads,
            running: 0,
            run_stats: RunStats {
                initial_file_count,
                ..RunStats::default()
            },
        }
    }

    pub(super) fn run_started(&mut self, file_list: &'a TestFileList) {
        self.basic_callback(RunEventKind::RunStarted {
            file_list,
            test_threads: self.test_threads,
        });
    }

    /// Receives events until every executor has dropped its sender.
    pub(super) async fn run(&mut self, mut executor_rx: UnboundedReceiver<ExecutorEvent<'a>>) {
        while let Some(event) = executor_rx.recv().await {
            self.handle_event(event);
        }
    }

    pub(super) fn run_finished(&mut self) -> RunStats {
        let stopwatch_end = self.stopwatch.snapshot();
        let run_stats = self.run_stats;
        self.basic_callback(RunEventKind::RunFinished {
            start_time: stopwatch_end.start_time.fixed_offset(),
            elapsed: stopwatch_end.duration,
            run_stats,
        });
        run_stats
    }

    fn handle_event(&mut self, event: ExecutorEvent<'a>) {
        match event {
            ExecutorEvent::Started { file } => {
                self.running += 1;
                self.run_stats.peak_running = self.run_stats.peak_running.max(self.running);
                debug_assert!(
                    self.running <= self.test_threads,
                    "{} units running, but the ceiling is {}",
                    self.running,
                    self.test_threads,
                );
                debug!(%file, running = self.running, "unit started");
                self.basic_callback(RunEventKind::UnitStarted {
                    file,
                    running: self.running,
                });
            }
            ExecutorEvent::Output {
                file,
                level,
                message,
            } => {
                self.basic_callback(RunEventKind::UnitOutput {
                    file,
                    level,
                    message,
                });
            }
            ExecutorEvent::Finished { file, result } => {
                self.running -= 1;
                self.run_stats.on_unit_finished(&result);
                debug!(%file, running = self.running, outcome = ?result.outcome(), "unit finished");
                self.basic_callback(RunEventKind::UnitFinished {
                    file,
                    result,
                    running: self.running,
                });
            }
        }
    }

    fn basic_callback(&mut self, kind: RunEventKind<'a>) {
        let snapshot = self.stopwatch.snapshot();
        let event = RunEvent {
            timestamp: snapshot.end_time().fixed_offset(),
            elapsed: snapshot.duration,
            kind,
        };
        (self.callback)(event)
    }
}
