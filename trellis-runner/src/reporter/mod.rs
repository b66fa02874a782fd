// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out and aggregates test execution statuses.
//!
//! The main structure in this module is [`Reporter`].

pub mod events;
mod helpers;
mod imp;

pub use imp::*;
