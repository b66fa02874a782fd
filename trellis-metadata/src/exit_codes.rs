// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `trellis` failures.
///
/// `trellis` runs may fail for a variety of reasons. This structure documents the exit codes that
/// may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum TrellisExitCode {}

impl TrellisExitCode {
    /// No errors occurred and trellis exited normally.
    pub const OK: i32 = 0;

    /// No test files were discovered, but no other errors occurred.
    pub const NO_TESTS_RUN: i32 = 4;

    /// A user issue happened while setting up a trellis invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// One or more cases failed, or one or more execution units crashed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// A discovery root did not exist, or the file pattern was invalid.
    pub const DISCOVERY_FAILED: i32 = 104;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
