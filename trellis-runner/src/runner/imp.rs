// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{DispatcherContext, ExecutorContext, ExecutorEvent};
use crate::{
    config::TestThreads,
    discovery::TestFileList,
    errors::TestRunnerBuildError,
    reporter::events::{RunEvent, RunStats},
};
use futures::prelude::*;
use std::time::Duration;
use tokio::{runtime::Runtime, sync::mpsc::unbounded_channel};
use tracing::debug;

/// Substring filters passed to every unit.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunFilter {
    /// Only run cases inside a suite whose name contains this string.
    pub suite: Option<String>,

    /// Only run cases whose name contains this string.
    pub case: Option<String>,
}

impl RunFilter {
    /// Creates a new filter. Empty strings match everything.
    pub fn new(suite: Option<String>, case: Option<String>) -> Self {
        Self {
            suite: suite.filter(|s| !s.is_empty()),
            case: case.filter(|s| !s.is_empty()),
        }
    }
}

/// Test runner options.
#[derive(Debug, Default)]
pub struct TestRunnerBuilder {
    test_threads: Option<TestThreads>,
    unit_timeout: Option<Duration>,
    wrapper: Vec<String>,
    filter: RunFilter,
    update_snapshots: bool,
}

impl TestRunnerBuilder {
    /// Sets the number of units to run simultaneously.
    pub fn set_test_threads(&mut self, test_threads: TestThreads) -> &mut Self {
        self.test_threads = Some(test_threads);
        self
    }

    /// Sets the time after which a unit is killed and its file reported as failed.
    pub fn set_unit_timeout(&mut self, unit_timeout: Option<Duration>) -> &mut Self {
        self.unit_timeout = unit_timeout;
        self
    }

    /// Sets the command test files are run through. The file path is appended to it.
    ///
    /// With an empty wrapper, test files are executed directly.
    pub fn set_wrapper(&mut self, wrapper: Vec<String>) -> &mut Self {
        self.wrapper = wrapper;
        self
    }

    /// Sets the case filters passed to every unit.
    pub fn set_filter(&mut self, filter: RunFilter) -> &mut Self {
        self.filter = filter;
        self
    }

    /// If true, units overwrite snapshots that do not match instead of failing.
    pub fn set_update_snapshots(&mut self, update_snapshots: bool) -> &mut Self {
        self.update_snapshots = update_snapshots;
        self
    }

    /// Creates a new test runner.
    pub fn build(self, file_list: &TestFileList) -> Result<TestRunner<'_>, TestRunnerBuildError> {
        let test_threads = self.test_threads.unwrap_or_default().compute().max(1);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("trellis-runner-worker")
            .build()
            .map_err(TestRunnerBuildError::TokioRuntimeCreate)?;

        Ok(TestRunner {
            file_list,
            test_threads,
            unit_timeout: self.unit_timeout,
            wrapper: self.wrapper,
            filter: self.filter,
            update_snapshots: self.update_snapshots,
            runtime,
        })
    }
}

/// Context for running tests.
///
/// Created using [`TestRunnerBuilder::build`].
#[derive(Debug)]
pub struct TestRunner<'a> {
    file_list: &'a TestFileList,
    test_threads: usize,
    unit_timeout: Option<Duration>,
    wrapper: Vec<String>,
    filter: RunFilter,
    update_snapshots: bool,
    runtime: Runtime,
}

impl<'a> TestRunner<'a> {
    /// Returns the maximum number of units that run at the same time.
    pub fn test_threads(&self) -> usize {
        self.test_threads
    }

    /// Executes every listed file, each one in its own process.
    ///
    /// At most [`test_threads`](Self::test_threads) units run at a time. As soon as one finishes,
    /// the next file in the list is started. The callback is called with every event, in the
    /// order the events were observed.
    ///
    /// Failures of individual units never end the run early: each one is reported as a failed
    /// suite for that file.
    pub fn execute<F>(self, callback: F) -> RunStats
    where
        F: FnMut(RunEvent<'a>),
    {
        let mut dispatcher_cx =
            DispatcherContext::new(callback, self.file_list.len(), self.test_threads);
        dispatcher_cx.run_started(self.file_list);

        let executor_cx = ExecutorContext {
            wrapper: &self.wrapper,
            unit_timeout: self.unit_timeout,
            filter: &self.filter,
            update_snapshots: self.update_snapshots,
        };
        let file_list = self.file_list;
        let test_threads = self.test_threads;
        debug!(files = file_list.len(), test_threads, "starting run");

        let (executor_tx, executor_rx) = unbounded_channel::<ExecutorEvent<'a>>();
        let executor_fut = async move {
            // Every sender is dropped once all units have finished, which ends the dispatcher.
            futures::stream::iter(file_list.iter())
                .map(|file| executor_cx.run_unit(file, executor_tx.clone()))
                .buffer_unordered(test_threads)
                .for_each(|()| future::ready(()))
                .await;
        };

        self.runtime.block_on(async {
            tokio::join!(dispatcher_cx.run(executor_rx), executor_fut);
        });

        dispatcher_cx.run_finished()
    }
}
