// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Environment variables set by the coordinator on every execution unit.
///
/// A test program that finds [`UNIT`](UnitEnv::UNIT) set speaks the line protocol on stdout.
/// Without it, the program runs in standalone mode and prints human-readable results instead.
pub enum UnitEnv {}

impl UnitEnv {
    /// Set to `1` when the process is running as an execution unit under `trellis run`.
    pub const UNIT: &'static str = "TRELLIS_UNIT";

    /// The absolute path of the test file. This is the identity used for snapshots.
    pub const TEST_FILE: &'static str = "TRELLIS_TEST_FILE";

    /// Substring filter applied to suite names.
    pub const SUITE_FILTER: &'static str = "TRELLIS_SUITE_FILTER";

    /// Substring filter applied to case names.
    pub const CASE_FILTER: &'static str = "TRELLIS_CASE_FILTER";

    /// Set to `1` to overwrite stored snapshots instead of comparing against them.
    pub const UPDATE_SNAPSHOTS: &'static str = "TRELLIS_UPDATE_SNAPSHOTS";

    /// Returns true if an environment variable value should be treated as enabled.
    pub fn is_enabled(value: &str) -> bool {
        matches!(value.trim(), "1" | "true" | "yes")
    }
}
