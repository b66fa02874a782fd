// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::SnapshotError,
    snapshot::{SnapshotOutcome, SnapshotStore},
};
use serde::Serialize;
use std::{
    cell::RefCell,
    fmt,
    io::{self, Write},
    rc::Rc,
};
use trellis_metadata::{SnapshotSummary, UnitMessage};

/// A destination for messages produced by a running test file.
pub trait MessageSink {
    /// Sends a message.
    fn send(&self, message: UnitMessage);
}

/// Writes messages to standard output as JSON lines, for consumption by the coordinator.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutSink;

impl MessageSink for StdoutSink {
    fn send(&self, message: UnitMessage) {
        let mut stdout = io::stdout().lock();
        // If the coordinator went away there's nobody to report to.
        _ = writeln!(stdout, "{}", message.to_line());
        _ = stdout.flush();
    }
}

/// Keeps messages in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: RefCell<Vec<UnitMessage>>,
}

impl RecordingSink {
    /// Creates a new, empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the messages sent so far.
    pub fn messages(&self) -> Vec<UnitMessage> {
        self.messages.borrow().clone()
    }
}

impl MessageSink for RecordingSink {
    fn send(&self, message: UnitMessage) {
        self.messages.borrow_mut().push(message);
    }
}

/// Handle passed to case and hook bodies.
///
/// Cloning a context is cheap; all clones refer to the same file-level state.
#[derive(Clone)]
pub struct TestContext {
    inner: Rc<ContextInner>,
}

struct ContextInner {
    sink: Rc<dyn MessageSink>,
    snapshots: RefCell<SnapshotStore>,
    current_case: RefCell<Option<String>>,
}

impl TestContext {
    pub(crate) fn new(sink: Rc<dyn MessageSink>, snapshots: SnapshotStore) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                sink,
                snapshots: RefCell::new(snapshots),
                current_case: RefCell::new(None),
            }),
        }
    }

    /// Sends a diagnostic message to the coordinator.
    pub fn log(&self, message: impl Into<String>) {
        self.inner.sink.send(UnitMessage::Log {
            message: message.into(),
        });
    }

    /// Sends an informational message to the coordinator.
    pub fn info(&self, message: impl Into<String>) {
        self.inner.sink.send(UnitMessage::Info {
            message: message.into(),
        });
    }

    /// Returns the full name of the case currently running, if any.
    pub fn current_case(&self) -> Option<String> {
        self.inner.current_case.borrow().clone()
    }

    /// Compares `value` against the next snapshot of the running case.
    ///
    /// See [`SnapshotStore::compare`].
    pub fn snapshot<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<SnapshotOutcome, SnapshotError> {
        let case = self.inner.current_case.borrow();
        self.inner
            .snapshots
            .borrow_mut()
            .compare(case.as_deref().unwrap_or_default(), value)
    }

    pub(crate) fn set_current_case(&self, name: Option<String>) {
        *self.inner.current_case.borrow_mut() = name;
    }

    pub(crate) fn snapshot_summary(&self) -> SnapshotSummary {
        self.inner.snapshots.borrow().summary()
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("current_case", &self.inner.current_case.borrow())
            .field("snapshots", &self.inner.snapshots.borrow().path())
            .finish_non_exhaustive()
    }
}
