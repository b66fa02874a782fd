// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use trellis_metadata::{CaseStatus, SuiteOutcome};
use trellis_runner::{config::TestThreads, discovery::TestFileList};

#[test]
fn summary_counts_suites_and_cases() {
    let dir = ScriptDir::new();
    dir.add(
        "math.test",
        &emit(&done(
            "math",
            vec![
                case("math", "adds", CaseStatus::Passed),
                case("math", "subtracts", CaseStatus::Passed),
            ],
        )),
    );
    dir.add(
        "strings.test",
        &emit(&done(
            "strings",
            vec![case("strings", "concatenates", CaseStatus::Failed)],
        )),
    );

    let output = run(&dir.discover(), |_| {});

    assert!(
        output
            .report
            .contains("Test Suites: 1 failed, 1 passed, 2 total\n"),
        "report:\n{}",
        output.report
    );
    assert!(
        output.report.contains("Tests: 1 failed, 2 passed, 3 total\n"),
        "report:\n{}",
        output.report
    );
    assert_eq!(output.stats.suites_total(), 2);
    assert_eq!(output.stats.cases_total(), 3);
    assert!(!output.stats.is_success());
}

#[test]
fn ceiling_is_respected_and_crashes_are_isolated() {
    let dir = ScriptDir::new();
    let passing = emit(&done("ok", vec![case("ok", "works", CaseStatus::Passed)]));
    for name in ["a.test", "b.test", "d.test", "e.test"] {
        dir.add(name, &format!("sleep 0.3\n{passing}"));
    }
    dir.add("c.test", "sleep 0.3\necho partial output\nexit 3\n");

    let file_list = dir.discover();
    assert_eq!(file_list.len(), 5);
    let output = run(&file_list, |builder| {
        builder.set_test_threads(TestThreads::Count(2));
    });

    let finished: BTreeSet<_> = output
        .results()
        .into_iter()
        .map(|result| result.file.clone())
        .collect();
    let expected: BTreeSet<_> = file_list.iter().map(ToOwned::to_owned).collect();
    assert_eq!(finished, expected, "every file has exactly one result");
    assert_eq!(output.results().len(), 5);

    assert_eq!(output.stats.peak_running, 2);
    for event in &output.events {
        match event {
            OwnedEvent::Started { running, .. } | OwnedEvent::Finished { running, .. } => {
                assert!(*running <= 2, "too many units running: {event:?}");
            }
            OwnedEvent::Output { .. } => {}
        }
    }

    let crashed = output.result_for("c.test");
    assert_eq!(crashed.outcome(), SuiteOutcome::Failed);
    let error = crashed.error.as_deref().expect("crash is reported");
    assert!(
        error.starts_with("unit exited with code 3 without reporting results"),
        "unexpected error: {error}"
    );
    assert_eq!(output.messages_for("c.test"), vec!["partial output"]);

    assert_eq!(output.stats.suites_passed, 4);
    assert_eq!(output.stats.suites_failed, 1);
    assert_eq!(output.stats.unit_failures, 1);
    assert_eq!(output.stats.finished_file_count, 5);
}

#[test]
fn each_unit_starts_before_it_finishes() {
    let dir = ScriptDir::new();
    let passing = emit(&done("ok", vec![case("ok", "works", CaseStatus::Passed)]));
    for name in ["a.test", "b.test", "c.test"] {
        dir.add(name, &passing);
    }

    let output = run(&dir.discover(), |builder| {
        builder.set_test_threads(TestThreads::Count(1));
    });

    let mut started = BTreeSet::new();
    for event in &output.events {
        match event {
            OwnedEvent::Started { file, running } => {
                assert_eq!(*running, 1);
                started.insert(file.clone());
            }
            OwnedEvent::Finished { result, running } => {
                assert_eq!(*running, 0);
                assert!(started.contains(&result.file), "{} finished first", result.file);
            }
            OwnedEvent::Output { .. } => {}
        }
    }
    assert_eq!(output.stats.peak_running, 1);
    assert!(output.stats.is_success());
}

#[test]
fn empty_run() {
    let output = run(&TestFileList::default(), |_| {});
    assert!(output.events.is_empty());
    assert_eq!(output.stats.suites_total(), 0);
    assert!(
        output.report.contains("Test Suites: 0 total\n"),
        "report:\n{}",
        output.report
    );
}
