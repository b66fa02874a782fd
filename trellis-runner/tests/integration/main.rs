// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the runner. These spawn real processes: every test file is a shell
//! script run through `sh`.

#![cfg(unix)]

mod fixtures;
mod protocol;
mod scheduling;
