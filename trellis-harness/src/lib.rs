// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write test programs for the trellis test runner.
//!
//! A test program declares a tree of suites and cases, with hooks that run around them. It is
//! built as an executable (for Cargo, a `[[test]]` target with `harness = false`) whose `main` is
//! defined by [`main!`]:
//!
//! ```no_run
//! use std::{cell::Cell, rc::Rc};
//! use trellis_harness::{Suite, expect};
//!
//! fn register(s: &mut Suite) {
//!     let counter = Rc::new(Cell::new(0));
//!     s.before_each({
//!         let counter = counter.clone();
//!         move |_| {
//!             counter.set(counter.get() + 1);
//!             Ok(())
//!         }
//!     });
//!     s.describe("counter", |s| {
//!         s.case("is incremented before each case", {
//!             let counter = counter.clone();
//!             move |_| Ok(expect(counter.get()).to_equal(1)?)
//!         });
//!     });
//! }
//!
//! trellis_harness::main!(register);
//! ```
//!
//! When spawned by `trellis run`, the program reports to the coordinator over standard output.
//! When run directly, it prints a human-readable report and exits with code 1 if any case
//! failed.
//!
//! Besides the tree, this crate provides [assertions](expect), [mocks](Mock),
//! [spies](Spy) and [snapshots](TestContext::snapshot).

#![warn(missing_docs)]

mod context;
mod diff;
mod errors;
mod expect;
mod mock;
pub mod snapshot;
mod spy;
mod tree;
mod unit;

pub use context::{MessageSink, RecordingSink, StdoutSink, TestContext};
pub use errors::{AssertionMismatch, DisplayDiff, Error, Result, SnapshotError};
pub use expect::{Expectation, Identity, Length, Truthy, expect};
pub use mock::{CallHistory, Mock};
pub use spy::{Method, Spy, spy_on};
pub use tree::{CaseFilter, CaseId, CaseKind, HookKind, RunOptions, Suite, TestTree};
pub use unit::{UnitSettings, run_main, run_unit};
