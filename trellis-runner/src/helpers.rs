// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for trellis-runner.

use std::time::Duration;

/// Utilities for pluralizing various words based on count.
pub mod plural {
    /// Returns "file" if `count` is 1, otherwise "files".
    pub fn files_str(count: usize) -> &'static str {
        if count == 1 { "file" } else { "files" }
    }

    /// Returns "case" if `count` is 1, otherwise "cases".
    pub fn cases_str(count: usize) -> &'static str {
        if count == 1 { "case" } else { "cases" }
    }

    /// Returns "unit" if `count` is 1, otherwise "units".
    pub fn units_str(count: usize) -> &'static str {
        if count == 1 { "unit" } else { "units" }
    }
}

/// Formats a duration as seconds with millisecond precision, e.g. `1.250s`.
pub fn format_duration_secs(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}

/// Returns the display width of `s` once ANSI escape sequences are removed.
pub fn display_width(s: &str) -> usize {
    let stripped = strip_ansi_escapes::strip_str(s);
    stripped.chars().count()
}
