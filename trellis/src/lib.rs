// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A parallel runner for test programs written with `trellis-harness`.
//!
//! `trellis run` discovers test files under the given paths, runs each one in its own process
//! with a bounded number running at a time, and prints a report as results arrive.
//! `trellis list` prints the files that would be run.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter, StderrStyles};
