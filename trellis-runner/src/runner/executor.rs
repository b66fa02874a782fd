// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The executor for test files.
//!
//! This component is responsible for running one execution unit per file and reporting what it
//! says to the dispatcher. The executor does not communicate with the outside world: all
//! communication is mediated by the dispatcher, which owns every counter.

use super::RunFilter;
use crate::{errors::UnitSpawnError, reporter::events::OutputLevel, time::stopwatch};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    error::Error,
    fmt::Write as _,
    process::{ExitStatus, Stdio},
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
};
use tracing::{debug, warn};
use trellis_metadata::{SuiteResult, UnitEnv, UnitMessage};

/// An event sent from the executor to the dispatcher.
#[derive(Debug)]
pub(super) enum ExecutorEvent<'a> {
    Started {
        file: &'a Utf8Path,
    },
    Output {
        file: &'a Utf8Path,
        level: OutputLevel,
        message: String,
    },
    Finished {
        file: &'a Utf8Path,
        result: SuiteResult,
    },
}

#[derive(Debug)]
pub(super) struct ExecutorContext<'cx> {
    pub(super) wrapper: &'cx [String],
    pub(super) unit_timeout: Option<Duration>,
    pub(super) filter: &'cx RunFilter,
    pub(super) update_snapshots: bool,
}

impl ExecutorContext<'_> {
    /// Runs the unit for `file` to completion.
    ///
    /// Exactly one `Started` and one `Finished` event are sent, in that order, whatever happens
    /// to the unit.
    pub(super) async fn run_unit<'a>(
        &self,
        file: &'a Utf8Path,
        tx: UnboundedSender<ExecutorEvent<'a>>,
    ) {
        // The dispatcher outlives every unit, so send errors can only happen if it panicked.
        _ = tx.send(ExecutorEvent::Started { file });

        let stopwatch = stopwatch();
        let mut result = match self.run_unit_inner(file, &tx).await {
            Ok(result) => result,
            Err(error) => SuiteResult::unit_failure(file, display_error_chain(&error)),
        };
        // Units report their own identity as an absolute path. Results are keyed by the path
        // the file was discovered at.
        result.file = file.to_owned();
        if result.error.is_some() {
            result.duration = stopwatch.snapshot().duration;
        }

        _ = tx.send(ExecutorEvent::Finished { file, result });
    }

    async fn run_unit_inner<'a>(
        &self,
        file: &'a Utf8Path,
        tx: &UnboundedSender<ExecutorEvent<'a>>,
    ) -> Result<SuiteResult, UnitSpawnError> {
        let absolute = absolute_path(file);
        let mut command = self.make_command(&absolute);
        let program = match self.wrapper.first() {
            Some(program) => program.clone(),
            None => absolute.to_string(),
        };

        let mut child = command
            .spawn()
            .map_err(|error| UnitSpawnError::new(program, error))?;
        debug!(%file, pid = ?child.id(), "spawned unit");

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let collect = async {
            let (report, stderr) = tokio::join!(
                read_messages(file, stdout, tx),
                read_to_string_lossy(stderr),
            );
            let status = child.wait().await;
            (report, stderr, status)
        };

        let collected = match self.unit_timeout {
            Some(timeout) => tokio::time::timeout(timeout, collect).await.ok(),
            None => Some(collect.await),
        };

        let Some((report, stderr, status)) = collected else {
            let timeout = self.unit_timeout.unwrap_or_default();
            debug!(%file, ?timeout, "unit timed out, killing it");
            if let Err(error) = child.kill().await {
                warn!("failed to kill unit for {file}: {error}");
            }
            return Ok(SuiteResult::unit_failure(
                file,
                format!(
                    "timed out after {}",
                    humantime::format_duration(timeout)
                ),
            ));
        };

        let succeeded = matches!(&status, Ok(status) if status.success());
        let status_desc = match &status {
            Ok(status) => describe_exit_status(*status),
            Err(error) => format!("could not be waited for ({error})"),
        };

        let result = match report {
            Some(UnitReport::Done(results)) => {
                if !succeeded {
                    warn!("unit for {file} reported results, then {status_desc}");
                }
                match SuiteResult::fold(results) {
                    Some(result) => result,
                    None => SuiteResult::unit_failure(file, "unit reported no results"),
                }
            }
            Some(UnitReport::Error(message)) => {
                SuiteResult::unit_failure(file, with_stderr(message, &stderr))
            }
            None => SuiteResult::unit_failure(
                file,
                with_stderr(format!("unit {status_desc} without reporting results"), &stderr),
            ),
        };
        Ok(result)
    }

    fn make_command(&self, absolute: &Utf8Path) -> Command {
        let mut command = match self.wrapper.split_first() {
            Some((program, args)) => {
                let mut command = Command::new(program);
                command.args(args).arg(absolute);
                command
            }
            None => Command::new(absolute),
        };

        command
            .env(UnitEnv::UNIT, "1")
            .env(UnitEnv::TEST_FILE, absolute)
            .env_remove(UnitEnv::SUITE_FILTER)
            .env_remove(UnitEnv::CASE_FILTER)
            .env_remove(UnitEnv::UPDATE_SNAPSHOTS)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(suite) = &self.filter.suite {
            command.env(UnitEnv::SUITE_FILTER, suite);
        }
        if let Some(case) = &self.filter.case {
            command.env(UnitEnv::CASE_FILTER, case);
        }
        if self.update_snapshots {
            command.env(UnitEnv::UPDATE_SNAPSHOTS, "1");
        }
        command
    }
}

/// The terminal message of a unit.
#[derive(Debug)]
enum UnitReport {
    Done(Vec<SuiteResult>),
    Error(String),
}

/// Reads protocol messages from a unit's standard output until it is closed.
///
/// Lines that are not protocol messages are forwarded as log output. The first terminal message
/// is kept; output after it is still forwarded.
async fn read_messages<'a>(
    file: &'a Utf8Path,
    stdout: impl AsyncRead + Unpin,
    tx: &UnboundedSender<ExecutorEvent<'a>>,
) -> Option<UnitReport> {
    let mut report = None;
    let mut lines = BufReader::new(stdout).split(b'\n');
    loop {
        let line = match lines.next_segment().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                warn!("error reading output of unit for {file}: {error}");
                break;
            }
        };
        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end_matches('\r');

        // A message can follow output that did not end in a newline.
        let (output, message) = UnitMessage::split_line(line);
        if message.is_none() || !output.is_empty() {
            _ = tx.send(ExecutorEvent::Output {
                file,
                level: OutputLevel::Log,
                message: output.to_owned(),
            });
        }
        let (level, message) = match message {
            None => continue,
            Some(UnitMessage::Log { message }) => (OutputLevel::Log, message),
            Some(UnitMessage::Info { message }) => (OutputLevel::Info, message),
            Some(UnitMessage::Done { results }) => {
                set_report(file, &mut report, UnitReport::Done(results));
                continue;
            }
            Some(UnitMessage::Error { message }) => {
                set_report(file, &mut report, UnitReport::Error(message));
                continue;
            }
        };
        _ = tx.send(ExecutorEvent::Output {
            file,
            level,
            message,
        });
    }
    report
}

fn set_report(file: &Utf8Path, report: &mut Option<UnitReport>, new: UnitReport) {
    if report.is_some() {
        warn!("unit for {file} sent more than one terminal message, ignoring {new:?}");
    } else {
        *report = Some(new);
    }
}

async fn read_to_string_lossy(mut reader: impl AsyncRead + Unpin) -> String {
    let mut buf = Vec::new();
    // Whatever was read before an error is still useful.
    _ = reader.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

fn with_stderr(message: String, stderr: &str) -> String {
    let stderr = stderr.trim_end();
    if stderr.is_empty() {
        message
    } else {
        format!("{message}\n\nstderr:\n{stderr}")
    }
}

fn absolute_path(file: &Utf8Path) -> Utf8PathBuf {
    std::path::absolute(file)
        .ok()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(|| file.to_owned())
}

/// Describes how a process ended, for example "exited with code 3".
fn describe_exit_status(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exited with code {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            return format!("was terminated by signal {signal}");
        }
    }
    "exited abnormally".to_owned()
}

fn display_error_chain(error: &dyn Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        _ = write!(out, ": {cause}");
        source = cause.source();
    }
    out
}
