// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test tree.
//!
//! A [`TestTree`] is built by registering cases, nested suites and hooks on its root [`Suite`],
//! and is then consumed by [`TestTree::run`]. Because running takes the tree by value, nothing can
//! be registered once execution has started.
//!
//! State shared between hooks and cases is captured by the registered closures, typically as an
//! `Rc<Cell<_>>` or `Rc<RefCell<_>>`:
//!
//! ```
//! use std::{cell::Cell, rc::Rc};
//! use trellis_harness::{TestTree, expect};
//!
//! let mut tree = TestTree::new("counter");
//! tree.register(|s| {
//!     let counter = Rc::new(Cell::new(0));
//!     s.before_each({
//!         let counter = counter.clone();
//!         move |_| {
//!             counter.set(counter.get() + 1);
//!             Ok(())
//!         }
//!     });
//!     s.case("first", {
//!         let counter = counter.clone();
//!         move |_| Ok(expect(counter.get()).to_equal(1)?)
//!     });
//! });
//! ```

mod execute;
mod filter;

pub use filter::CaseFilter;

use crate::{
    context::{MessageSink, TestContext},
    errors::Result,
    snapshot::{SnapshotMode, SnapshotStore},
};
use camino::Utf8PathBuf;
use futures::future::{FutureExt, LocalBoxFuture};
use newtype_uuid::{TypedUuid, TypedUuidKind, TypedUuidTag};
use std::{fmt, future::Future, rc::Rc, time::Instant};
use trellis_metadata::SuiteResult;

/// The kind for [`CaseId`].
pub enum CaseKind {}

impl TypedUuidKind for CaseKind {
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("case");
        TAG
    }
}

/// A unique identifier for a case, generated at registration.
pub type CaseId = TypedUuid<CaseKind>;

type SyncBody = Box<dyn FnMut(&TestContext) -> Result<()>>;
type AsyncBody = Box<dyn FnMut(TestContext) -> LocalBoxFuture<'static, Result<()>>>;

/// A case or hook body.
pub(crate) enum Body {
    Sync(SyncBody),
    Async(AsyncBody),
}

impl Body {
    fn sync(f: impl FnMut(&TestContext) -> Result<()> + 'static) -> Self {
        Self::Sync(Box::new(f))
    }

    fn from_async<F, Fut>(mut f: F) -> Self
    where
        F: FnMut(TestContext) -> Fut + 'static,
        Fut: Future<Output = Result<()>> + 'static,
    {
        Self::Async(Box::new(move |cx| f(cx).boxed_local()))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Body::Sync"),
            Self::Async(_) => f.write_str("Body::Async"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct CaseDecl {
    pub(crate) id: CaseId,
    pub(crate) name: String,
    /// `None` for cases declared as skipped.
    pub(crate) body: Option<Body>,
}

#[derive(Debug)]
pub(crate) enum Node {
    Case(CaseDecl),
    Suite(Suite),
}

/// When a hook runs relative to the cases of its suite.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HookKind {
    /// Once, before the first case of the suite.
    BeforeAll,
    /// Before each case in the suite and its descendants.
    BeforeEach,
    /// After each case in the suite and its descendants.
    AfterEach,
    /// Once, after the last case of the suite.
    AfterAll,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeAll => write!(f, "before_all hook"),
            Self::BeforeEach => write!(f, "before_each hook"),
            Self::AfterEach => write!(f, "after_each hook"),
            Self::AfterAll => write!(f, "after_all hook"),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Hooks {
    pub(crate) before_all: Vec<Body>,
    pub(crate) before_each: Vec<Body>,
    pub(crate) after_each: Vec<Body>,
    pub(crate) after_all: Vec<Body>,
}

impl Hooks {
    fn push(&mut self, kind: HookKind, body: Body) {
        let list = match kind {
            HookKind::BeforeAll => &mut self.before_all,
            HookKind::BeforeEach => &mut self.before_each,
            HookKind::AfterEach => &mut self.after_each,
            HookKind::AfterAll => &mut self.after_all,
        };
        list.push(body);
    }
}

/// A named group of cases, nested suites and hooks.
///
/// Children run in the order they were registered. Hooks of the same kind run in registration
/// order.
#[derive(Debug)]
pub struct Suite {
    name: String,
    pub(crate) children: Vec<Node>,
    pub(crate) hooks: Hooks,
}

impl Suite {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            hooks: Hooks::default(),
        }
    }

    /// Returns the name of this suite.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a nested suite, populated by `f`.
    pub fn describe(&mut self, name: impl Into<String>, f: impl FnOnce(&mut Suite)) -> &mut Self {
        let mut suite = Suite::new(name);
        f(&mut suite);
        self.children.push(Node::Suite(suite));
        self
    }

    /// Registers a case.
    pub fn case(
        &mut self,
        name: impl Into<String>,
        f: impl FnMut(&TestContext) -> Result<()> + 'static,
    ) -> &mut Self {
        self.push_case(name, Some(Body::sync(f)))
    }

    /// Registers a case with an asynchronous body.
    ///
    /// The body runs to completion on a single-threaded runtime before the next body starts.
    pub fn case_async<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: FnMut(TestContext) -> Fut + 'static,
        Fut: Future<Output = Result<()>> + 'static,
    {
        self.push_case(name, Some(Body::from_async(f)))
    }

    /// Registers a case that is reported as skipped without running.
    pub fn skip(
        &mut self,
        name: impl Into<String>,
        _f: impl FnMut(&TestContext) -> Result<()> + 'static,
    ) -> &mut Self {
        self.push_case(name, None)
    }

    /// Registers a hook that runs once before the first case of this suite.
    pub fn before_all(&mut self, f: impl FnMut(&TestContext) -> Result<()> + 'static) -> &mut Self {
        self.hook(HookKind::BeforeAll, Body::sync(f))
    }

    /// Registers a hook that runs before every case in this suite and its descendants.
    pub fn before_each(
        &mut self,
        f: impl FnMut(&TestContext) -> Result<()> + 'static,
    ) -> &mut Self {
        self.hook(HookKind::BeforeEach, Body::sync(f))
    }

    /// Registers a hook that runs after every case in this suite and its descendants.
    pub fn after_each(&mut self, f: impl FnMut(&TestContext) -> Result<()> + 'static) -> &mut Self {
        self.hook(HookKind::AfterEach, Body::sync(f))
    }

    /// Registers a hook that runs once after the last case of this suite.
    pub fn after_all(&mut self, f: impl FnMut(&TestContext) -> Result<()> + 'static) -> &mut Self {
        self.hook(HookKind::AfterAll, Body::sync(f))
    }

    /// Registers an asynchronous hook of the given kind.
    pub fn hook_async<F, Fut>(&mut self, kind: HookKind, f: F) -> &mut Self
    where
        F: FnMut(TestContext) -> Fut + 'static,
        Fut: Future<Output = Result<()>> + 'static,
    {
        self.hook(kind, Body::from_async(f))
    }

    fn hook(&mut self, kind: HookKind, body: Body) -> &mut Self {
        self.hooks.push(kind, body);
        self
    }

    fn push_case(&mut self, name: impl Into<String>, body: Option<Body>) -> &mut Self {
        self.children.push(Node::Case(CaseDecl {
            id: CaseId::new_v4(),
            name: name.into(),
            body,
        }));
        self
    }

    /// Returns the number of cases registered in this suite and its descendants.
    pub fn case_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                Node::Case(_) => 1,
                Node::Suite(suite) => suite.case_count(),
            })
            .sum()
    }

    /// Returns true if any case in this suite or its descendants is selected by `filter`.
    pub(crate) fn has_match(&self, filter: &CaseFilter, path: &mut Vec<String>) -> bool {
        path.push(self.name.clone());
        let found = self.children.iter().any(|child| match child {
            Node::Case(case) => filter.matches(path, &case.name),
            Node::Suite(suite) => suite.has_match(filter, path),
        });
        path.pop();
        found
    }
}

/// Options for a single run of a [`TestTree`].
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// The identity of the test file, used for results and to locate snapshots.
    pub test_file: Utf8PathBuf,

    /// Which cases to run.
    pub filter: CaseFilter,

    /// How snapshot comparisons behave.
    pub snapshot_mode: SnapshotMode,
}

impl RunOptions {
    /// Creates options that run every case of `test_file` and compare snapshots.
    pub fn new(test_file: impl Into<Utf8PathBuf>) -> Self {
        Self {
            test_file: test_file.into(),
            filter: CaseFilter::default(),
            snapshot_mode: SnapshotMode::Compare,
        }
    }
}

/// The tree of suites and cases declared by one test file.
#[derive(Debug)]
pub struct TestTree {
    root: Suite,
}

impl TestTree {
    /// Creates a tree whose root suite has the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            root: Suite::new(name),
        }
    }

    /// Registers cases, suites and hooks on the root suite.
    pub fn register(&mut self, f: impl FnOnce(&mut Suite)) -> &mut Self {
        f(&mut self.root);
        self
    }

    /// Returns the root suite.
    pub fn root(&self) -> &Suite {
        &self.root
    }

    /// Runs the selected cases in declared order, consuming the tree.
    ///
    /// Messages produced by bodies through [`TestContext::log`] and [`TestContext::info`] go to
    /// `sink`.
    pub fn run(self, options: &RunOptions, sink: Rc<dyn MessageSink>) -> SuiteResult {
        let start = Instant::now();
        let suite = self.root.name().to_owned();
        let store = SnapshotStore::new(&options.test_file, options.snapshot_mode);
        let cx = TestContext::new(sink, store);

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
        {
            Ok(runtime) => runtime,
            Err(error) => {
                let mut result = SuiteResult::unit_failure(
                    options.test_file.clone(),
                    format!("failed to build async runtime: {error}"),
                );
                result.suite = suite;
                return result;
            }
        };

        tracing::debug!(
            file = %options.test_file,
            cases = self.root.case_count(),
            "running test tree"
        );
        let cases = execute::Executor::new(runtime, cx.clone(), &options.filter).run(self.root);

        SuiteResult {
            file: options.test_file.clone(),
            suite,
            cases,
            snapshots: cx.snapshot_summary(),
            duration: start.elapsed(),
            error: None,
        }
    }
}
