// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for trellis.
//!
//! Configuration is read from `.config/trellis.toml` under the project root, layered on top of
//! a built-in default. See [`TrellisConfig`].

mod imp;
mod test_threads;

pub use imp::*;
pub use test_threads::*;
