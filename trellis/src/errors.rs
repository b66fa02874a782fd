// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;
use trellis_metadata::TrellisExitCode;
use trellis_runner::errors::*;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders: errors are expected to be printed with
// display_to_stderr, which colorizes them.

/// An error that trellis expects and reports with a specific exit code.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("current directory is invalid")]
    CurrentDirInvalid {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirNotUtf8 {
        #[source]
        err: camino::FromPathBufError,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("file pattern parse error")]
    FilePatternParseError {
        #[from]
        err: FilePatternParseError,
    },
    #[error("wrapper parse error")]
    WrapperParseError {
        #[from]
        err: WrapperParseError,
    },
    #[error("discovery error")]
    DiscoveryError {
        #[from]
        err: DiscoveryError,
    },
    #[error("test runner build error")]
    TestRunnerBuildError {
        #[from]
        err: TestRunnerBuildError,
    },
    #[error("write event error")]
    WriteEventError {
        #[from]
        err: WriteEventError,
    },
    #[error("no test files found")]
    NoTestsRun { pattern: String },
    #[error("test run failed")]
    TestRunFailed,
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirInvalid { .. }
            | Self::CurrentDirNotUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::WrapperParseError { .. }
            | Self::TestRunnerBuildError { .. } => TrellisExitCode::SETUP_ERROR,
            Self::FilePatternParseError { .. } | Self::DiscoveryError { .. } => {
                TrellisExitCode::DISCOVERY_FAILED
            }
            Self::WriteEventError { .. } => TrellisExitCode::WRITE_OUTPUT_ERROR,
            Self::NoTestsRun { .. } => TrellisExitCode::NO_TESTS_RUN,
            Self::TestRunFailed => TrellisExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr, followed by the chain of causes.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirInvalid { err } => {
                error!("could not read the current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirNotUtf8 { err } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    err.as_path().display()
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse trellis config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::FilePatternParseError { err } => {
                error!("{err}");
                err.source()
            }
            Self::WrapperParseError { err } => {
                error!("{err}");
                err.source()
            }
            Self::DiscoveryError { err } => {
                error!("{err}");
                err.source()
            }
            Self::TestRunnerBuildError { err } => {
                error!("failed to build test runner");
                Some(err as &dyn Error)
            }
            Self::WriteEventError { err } => {
                error!("failed to write event to output");
                Some(err as &dyn Error)
            }
            Self::NoTestsRun { pattern } => {
                error!(
                    "no test files matching `{}` were found",
                    pattern.style(styles.bold)
                );
                None
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_runner::discovery::FilePattern;

    #[test]
    fn exit_codes() {
        let pattern_err = FilePattern::new("a[").expect_err("pattern is invalid");
        assert_eq!(
            ExpectedError::from(pattern_err).process_exit_code(),
            TrellisExitCode::DISCOVERY_FAILED
        );
        assert_eq!(
            ExpectedError::from(WrapperParseError::Empty).process_exit_code(),
            TrellisExitCode::SETUP_ERROR
        );
        assert_eq!(
            ExpectedError::NoTestsRun {
                pattern: "**/*.test".to_owned()
            }
            .process_exit_code(),
            TrellisExitCode::NO_TESTS_RUN
        );
        assert_eq!(
            ExpectedError::TestRunFailed.process_exit_code(),
            TrellisExitCode::TEST_RUN_FAILED
        );
    }
}
