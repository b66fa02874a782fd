// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs real trellis-harness programs through the runner.

use camino::Utf8PathBuf;
use camino_tempfile::Utf8TempDir;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use trellis_metadata::{CaseStatus, SuiteResult};
use trellis_runner::{
    config::TestThreads,
    discovery::{FilePattern, TestFileList},
    reporter::events::{RunEventKind, RunStats},
    runner::{RunFilter, TestRunnerBuilder},
};

const SNAPSHOT_UNIT: &str = env!("CARGO_BIN_EXE_snapshot-unit");

struct Outcome {
    stats: RunStats,
    results: Vec<SuiteResult>,
    output: Vec<String>,
}

fn run(dir: &Utf8TempDir, case: Option<&str>, update_snapshots: bool) -> Outcome {
    let file_list = TestFileList::discover(&[dir.path().to_owned()], &FilePattern::default())
        .expect("discovery succeeded");
    let mut builder = TestRunnerBuilder::default();
    builder
        .set_test_threads(TestThreads::Count(2))
        .set_wrapper(vec![SNAPSHOT_UNIT.to_owned()])
        .set_filter(RunFilter::new(None, case.map(str::to_owned)))
        .set_update_snapshots(update_snapshots);
    let runner = builder.build(&file_list).expect("runner built");

    let mut results = Vec::new();
    let mut output = Vec::new();
    let stats = runner.execute(|event| match event.kind {
        RunEventKind::UnitOutput { message, .. } => output.push(message),
        RunEventKind::UnitFinished { result, .. } => results.push(result),
        _ => {}
    });
    Outcome {
        stats,
        results,
        output,
    }
}

fn snapshot_file(dir: &Utf8TempDir) -> Utf8PathBuf {
    trellis_harness::snapshot::snapshot_path_for(&dir.path().join("greetings.test"))
}

fn read_snapshots(dir: &Utf8TempDir) -> Value {
    let contents = std::fs::read_to_string(snapshot_file(dir)).expect("snapshot file exists");
    serde_json::from_str(&contents).expect("snapshot file is JSON")
}

fn statuses(result: &SuiteResult) -> Vec<(String, CaseStatus)> {
    result
        .cases
        .iter()
        .map(|case| (case.full_name(), case.status))
        .collect()
}

#[test]
fn snapshots_are_created_then_matched() {
    let dir = Utf8TempDir::new().expect("created temp dir");
    std::fs::write(dir.path().join("greetings.test"), "").expect("wrote test file");

    let first = run(&dir, None, false);
    assert!(first.stats.is_success(), "first run failed: {:?}", first.results);
    assert_eq!(first.stats.suites_passed, 1);
    assert_eq!(first.stats.cases_passed, 3);
    assert_eq!(first.stats.snapshots.created, 3);
    assert_eq!(first.output, vec!["progress...".to_owned()]);

    let [result] = first.results.as_slice() else {
        panic!("expected one result, got {:?}", first.results);
    };
    assert_eq!(result.suite, "snapshots");
    assert_eq!(
        statuses(result),
        vec![
            ("snapshots > greetings > alpha".to_owned(), CaseStatus::Passed),
            ("snapshots > greetings > beta".to_owned(), CaseStatus::Passed),
            ("snapshots > greetings > gamma".to_owned(), CaseStatus::Passed),
        ]
    );
    assert_eq!(
        read_snapshots(&dir),
        json!({
            "snapshots > greetings > alpha 1": "alpha value",
            "snapshots > greetings > beta 1": "beta value",
            "snapshots > greetings > gamma 1": [1.5, 0.1 + 0.2],
        })
    );

    let second = run(&dir, None, false);
    assert!(second.stats.is_success());
    assert_eq!(second.stats.snapshots.matched, 3);
    assert_eq!(second.stats.snapshots.created, 0);
}

#[test]
fn filtered_runs_match_existing_snapshots() {
    let dir = Utf8TempDir::new().expect("created temp dir");
    std::fs::write(dir.path().join("greetings.test"), "").expect("wrote test file");

    assert!(run(&dir, None, false).stats.is_success());
    let stored = std::fs::read_to_string(snapshot_file(&dir)).expect("snapshot file exists");

    for update_snapshots in [false, true] {
        let filtered = run(&dir, Some("beta"), update_snapshots);
        assert!(
            filtered.stats.is_success(),
            "filtered run failed (update: {update_snapshots}): {:?}",
            filtered.results
        );
        assert_eq!(filtered.stats.cases_passed, 1);
        assert_eq!(filtered.stats.snapshots.matched, 1);
        assert_eq!(
            std::fs::read_to_string(snapshot_file(&dir)).expect("snapshot file exists"),
            stored,
            "snapshot file changed (update: {update_snapshots})"
        );
    }
}
