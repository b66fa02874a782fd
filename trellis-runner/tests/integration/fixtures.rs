// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use std::time::Duration;
use trellis_metadata::{
    CaseResult, CaseStatus, FailureDetail, SnapshotSummary, SuiteResult, UnitMessage,
};
use trellis_runner::{
    config::TestThreads,
    discovery::{FilePattern, TestFileList},
    reporter::{
        ReporterBuilder,
        events::{RunEventKind, RunStats},
    },
    runner::{RunFilter, TestRunnerBuilder},
};

/// A directory of shell-script test files.
pub(crate) struct ScriptDir {
    dir: Utf8TempDir,
}

impl ScriptDir {
    pub(crate) fn new() -> Self {
        Self {
            dir: Utf8TempDir::new().expect("created temp dir"),
        }
    }

    pub(crate) fn path(&self) -> &Utf8Path {
        self.dir.path()
    }

    /// Writes a script named `name` with the given body.
    pub(crate) fn add(&self, name: &str, body: &str) -> Utf8PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, body).expect("wrote script");
        path
    }

    pub(crate) fn discover(&self) -> TestFileList {
        TestFileList::discover(&[self.path().to_owned()], &FilePattern::default())
            .expect("discovery succeeded")
    }
}

/// Returns a script body that prints `message` as a protocol line.
pub(crate) fn emit(message: &UnitMessage) -> String {
    format!("cat <<'TRELLIS_EOF'\n{}\nTRELLIS_EOF\n", message.to_line())
}

pub(crate) fn done(suite: &str, cases: Vec<CaseResult>) -> UnitMessage {
    UnitMessage::Done {
        results: vec![SuiteResult {
            file: format!("/somewhere/{suite}").into(),
            suite: suite.to_owned(),
            cases,
            snapshots: SnapshotSummary::default(),
            duration: Duration::from_millis(3),
            error: None,
        }],
    }
}

pub(crate) fn case(suite: &str, name: &str, status: CaseStatus) -> CaseResult {
    CaseResult {
        id: format!("{suite}/{name}"),
        name: name.to_owned(),
        suite_path: vec![suite.to_owned()],
        status,
        failure: (status == CaseStatus::Failed)
            .then(|| FailureDetail::new("Expected: 1\nReceived: 2")),
        duration: Duration::from_millis(1),
    }
}

/// The outcome of a run: every event kind flattened to owned data, and the final stats.
pub(crate) struct RunOutput {
    pub(crate) events: Vec<OwnedEvent>,
    pub(crate) stats: RunStats,
    pub(crate) report: String,
}

#[derive(Debug)]
pub(crate) enum OwnedEvent {
    Started { file: Utf8PathBuf, running: usize },
    Output { file: Utf8PathBuf, message: String },
    Finished { result: SuiteResult, running: usize },
}

impl RunOutput {
    pub(crate) fn results(&self) -> Vec<&SuiteResult> {
        self.events
            .iter()
            .filter_map(|event| match event {
                OwnedEvent::Finished { result, .. } => Some(result),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn result_for(&self, name: &str) -> &SuiteResult {
        self.results()
            .into_iter()
            .find(|result| result.file.file_name() == Some(name))
            .unwrap_or_else(|| panic!("no result for {name}"))
    }

    pub(crate) fn messages_for(&self, name: &str) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                OwnedEvent::Output { file, message } if file.file_name() == Some(name) => {
                    Some(message.as_str())
                }
                _ => None,
            })
            .collect()
    }
}

pub(crate) fn run(
    file_list: &TestFileList,
    configure: impl FnOnce(&mut TestRunnerBuilder),
) -> RunOutput {
    let mut builder = TestRunnerBuilder::default();
    builder
        .set_test_threads(TestThreads::Count(4))
        .set_wrapper(vec!["sh".to_owned()])
        .set_filter(RunFilter::default());
    configure(&mut builder);
    let runner = builder.build(file_list).expect("runner built");

    let mut reporter = ReporterBuilder::default().build();
    let mut report = String::new();
    let mut events = Vec::new();
    let stats = runner.execute(|event| {
        reporter
            .report_event(&event, &mut report)
            .expect("writing to a string succeeds");
        match event.kind {
            RunEventKind::UnitStarted { file, running } => events.push(OwnedEvent::Started {
                file: file.to_owned(),
                running,
            }),
            RunEventKind::UnitOutput { file, message, .. } => events.push(OwnedEvent::Output {
                file: file.to_owned(),
                message,
            }),
            RunEventKind::UnitFinished {
                result, running, ..
            } => events.push(OwnedEvent::Finished { result, running }),
            RunEventKind::RunStarted { .. } | RunEventKind::RunFinished { .. } => {}
        }
    });

    RunOutput {
        events,
        stats,
        report,
    }
}
