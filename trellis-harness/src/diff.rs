// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use difference::{Changeset, Difference};
use swrite::{SWrite, swriteln};

/// Writes a line diff of `expected` against `received`.
///
/// Removed lines are prefixed with `- `, added lines with `+ ` and common lines with two spaces.
pub(crate) fn write_line_diff(out: &mut String, expected: &str, received: &str) {
    let changeset = Changeset::new(expected, received, "\n");
    for diff in &changeset.diffs {
        let (prefix, text) = match diff {
            Difference::Same(text) => ("  ", text),
            Difference::Rem(text) => ("- ", text),
            Difference::Add(text) => ("+ ", text),
        };
        for line in text.lines() {
            swriteln!(out, "{prefix}{line}");
        }
    }
}

pub(crate) fn line_diff(expected: &str, received: &str) -> String {
    let mut out = String::new();
    write_line_diff(&mut out, expected, received);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn diff_marks_changed_lines() {
        let expected = "a\nb\nc";
        let received = "a\nx\nc";
        assert_eq!(
            line_diff(expected, received),
            indoc! {"
                  a
                - b
                + x
                  c
            "}
        );
    }

    #[test]
    fn identical_input() {
        assert_eq!(line_diff("same", "same"), "  same\n");
    }
}
