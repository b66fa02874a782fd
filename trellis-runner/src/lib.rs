// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [trellis](https://crates.io/crates/trellis).
//!
//! A test run has four stages:
//!
//! 1. [Discovery](discovery): the configured roots are walked and matched against a file pattern,
//!    producing a sorted [`TestFileList`](discovery::TestFileList).
//! 2. [Configuration](config): the ceiling on concurrent units, the unit timeout and the wrapper
//!    command are read from `.config/trellis.toml`.
//! 3. [Execution](runner): every file runs in its own process. At most `test-threads` processes
//!    run at a time, and each reports back over its standard output.
//! 4. [Reporting](reporter): events are written out as they arrive, followed by a summary.
//!
//! The protocol spoken between the runner and the test programs it spawns lives in
//! `trellis-metadata`; test programs themselves are written with `trellis-harness`.

pub mod config;
pub mod discovery;
pub mod errors;
pub mod helpers;
pub mod reporter;
pub mod runner;
mod time;
pub mod write_str;
