// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use pretty_assertions::assert_eq;
use std::time::Duration;
use trellis_metadata::{CaseStatus, SuiteOutcome, UnitMessage};
use trellis_runner::runner::RunFilter;

#[test]
fn settings_reach_the_unit() {
    let dir = ScriptDir::new();
    let file = dir.add(
        "env.test",
        indoc::indoc! {r#"
            echo "$TRELLIS_UNIT|$TRELLIS_SUITE_FILTER|$TRELLIS_CASE_FILTER|$TRELLIS_UPDATE_SNAPSHOTS"
            echo "$TRELLIS_TEST_FILE"
        "#},
    );

    let output = run(&dir.discover(), |builder| {
        builder
            .set_filter(RunFilter::new(
                Some("math".to_owned()),
                Some("adds".to_owned()),
            ))
            .set_update_snapshots(true);
    });

    assert_eq!(
        output.messages_for("env.test"),
        vec!["1|math|adds|1", file.as_str()]
    );
}

#[test]
fn output_and_terminal_messages() {
    let dir = ScriptDir::new();
    let body = [
        "echo plain line".to_owned(),
        emit(&UnitMessage::Info {
            message: "connected".to_owned(),
        }),
        emit(&UnitMessage::Error {
            message: "failed to load: missing fixture".to_owned(),
        }),
        emit(&UnitMessage::Log {
            message: "after the end".to_owned(),
        }),
        emit(&done("late", vec![case("late", "ignored", CaseStatus::Passed)])),
        "echo oops >&2".to_owned(),
        "exit 1".to_owned(),
    ]
    .join("\n");
    dir.add("error.test", &body);

    let output = run(&dir.discover(), |_| {});

    assert_eq!(
        output.messages_for("error.test"),
        vec!["plain line", "connected", "after the end"]
    );
    let result = output.result_for("error.test");
    assert_eq!(result.outcome(), SuiteOutcome::Failed);
    assert!(result.cases.is_empty(), "the second terminal message is ignored");
    assert_eq!(
        result.error.as_deref(),
        Some("failed to load: missing fixture\n\nstderr:\noops")
    );
}

#[test]
fn several_results_are_folded() {
    let dir = ScriptDir::new();
    let mut first = done("multi", vec![case("multi", "one", CaseStatus::Passed)]);
    let UnitMessage::Done { results } = &mut first else {
        unreachable!()
    };
    let UnitMessage::Done { results: second } =
        done("other", vec![case("other", "two", CaseStatus::Skipped)])
    else {
        unreachable!()
    };
    results.extend(second);
    dir.add("multi.test", &emit(&first));

    let output = run(&dir.discover(), |_| {});

    let result = output.result_for("multi.test");
    assert_eq!(result.suite, "multi");
    assert_eq!(result.cases.len(), 2);
    assert_eq!(result.file, dir.path().join("multi.test"));
    assert_eq!(output.stats.suites_passed, 1);
    assert_eq!(output.stats.cases_skipped, 1);
}

#[test]
fn slow_units_are_killed() {
    let dir = ScriptDir::new();
    dir.add("slow.test", "sleep 10\n");

    let output = run(&dir.discover(), |builder| {
        builder.set_unit_timeout(Some(Duration::from_millis(200)));
    });

    let result = output.result_for("slow.test");
    assert_eq!(result.error.as_deref(), Some("timed out after 200ms"));
    assert!(
        result.duration < Duration::from_secs(5),
        "the unit was not waited for: {:?}",
        result.duration
    );
    assert_eq!(output.stats.unit_failures, 1);
}

#[test]
fn spawn_failures_are_reported_per_file() {
    let dir = ScriptDir::new();
    // Not executable, and run without a wrapper.
    dir.add("plain.test", "exit 0\n");

    let output = run(&dir.discover(), |builder| {
        builder.set_wrapper(Vec::new());
    });

    let result = output.result_for("plain.test");
    let error = result.error.as_deref().expect("spawn failure is reported");
    assert!(error.starts_with("failed to spawn `"), "unexpected error: {error}");
    assert_eq!(output.stats.suites_failed, 1);
}
