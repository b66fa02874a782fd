// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the trellis runner.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::io;
use thiserror::Error;

/// An error that occurred while discovering test files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// A discovery root does not exist.
    #[error("discovery root `{root}` does not exist")]
    RootNotFound {
        /// The root that was not found.
        root: Utf8PathBuf,
    },

    /// A directory could not be walked.
    #[error("failed to walk directory `{root}`")]
    Walk {
        /// The root being walked.
        root: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: walkdir::Error,
    },

    /// A discovered path is not valid UTF-8.
    #[error("discovered path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// The path, lossily converted.
        path: String,
    },
}

/// An error that occurred while parsing a file pattern.
#[derive(Debug, Error)]
#[error("invalid file pattern `{pattern}`")]
pub struct FilePatternParseError {
    pattern: String,
    #[source]
    error: globset::Error,
}

impl FilePatternParseError {
    pub(crate) fn new(pattern: impl Into<String>, error: globset::Error) -> Self {
        Self {
            pattern: pattern.into(),
            error,
        }
    }
}

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse trellis config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of a [`ConfigParseError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// The config sources could not be merged.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// The merged config could not be deserialized.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// The file pattern is invalid.
    #[error(transparent)]
    Pattern(#[from] FilePatternParseError),
}

/// Error returned while parsing a test-threads value.
#[derive(Clone, Debug, Error)]
#[error("error parsing test-threads value: {input}")]
pub struct TestThreadsParseError {
    /// The input that failed to parse.
    pub input: String,
}

impl TestThreadsParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while parsing a wrapper command line.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WrapperParseError {
    /// The command line could not be split into arguments.
    #[error("failed to split wrapper command `{input}`")]
    Split {
        /// The input.
        input: String,

        /// The underlying error.
        #[source]
        error: shell_words::ParseError,
    },

    /// The command line was empty.
    #[error("wrapper command is empty")]
    Empty,
}

/// An error that occurred while building a [`TestRunner`](crate::runner::TestRunner).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestRunnerBuildError {
    /// The tokio runtime could not be created.
    #[error("error creating tokio runtime")]
    TokioRuntimeCreate(#[source] io::Error),
}

/// An error that occurred while spawning an execution unit.
#[derive(Debug, Error)]
#[error("failed to spawn `{program}`")]
pub struct UnitSpawnError {
    program: String,
    #[source]
    error: io::Error,
}

impl UnitSpawnError {
    pub(crate) fn new(program: impl Into<String>, error: io::Error) -> Self {
        Self {
            program: program.into(),
            error,
        }
    }
}

/// An error that occurred while writing reporter output.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing to the output.
    #[error("error writing to output")]
    Io(#[from] io::Error),
}
