// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured messages exchanged between trellis execution units and the coordinator.
//!
//! Every test program linked against `trellis-harness` is started by `trellis run` as a separate
//! process. The process reports back over its standard output, one JSON-encoded [`UnitMessage`]
//! per line. This crate contains those types, along with the environment variables the
//! coordinator uses to configure a unit and the documented exit codes of the `trellis` binary.
//!
//! The types here are intentionally free of any runtime dependencies so that both sides of the
//! channel can share them.

mod env;
mod exit_codes;
mod protocol;

pub use env::*;
pub use exit_codes::*;
pub use protocol::*;
