// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the harness.

use camino::Utf8PathBuf;
use std::{fmt, io, panic::Location};
use thiserror::Error;

/// The error type returned by case and hook bodies.
///
/// Any error can be returned from a body with `?`; the harness records its message (and its
/// chain of sources) as the case's failure.
pub type Error = Box<dyn std::error::Error + 'static>;

/// The result type for case and hook bodies.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A matcher did not hold.
///
/// Produced by the methods on [`Expectation`](crate::Expectation). The message contains the
/// expected and received values, and a line diff where that's useful.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AssertionMismatch {
    message: String,
    location: &'static Location<'static>,
}

impl AssertionMismatch {
    pub(crate) fn new(message: impl Into<String>, location: &'static Location<'static>) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the location of the `expect` call that produced this mismatch.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

/// An error that occurred while comparing against, reading or writing snapshots.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SnapshotError {
    /// The value differs from the stored snapshot.
    #[error(
        "snapshot `{key}` in `{path}` does not match the stored value\n\n{diff}\n\
         re-run with `--update-snapshots` (or TRELLIS_UPDATE_SNAPSHOTS=1) to update it"
    )]
    Mismatch {
        /// The snapshot file.
        path: Utf8PathBuf,

        /// The key of the snapshot: the case's full name and the snapshot's index within it.
        key: String,

        /// A line diff between the stored and the received value.
        diff: DisplayDiff,
    },

    /// The value could not be serialized.
    #[error("failed to serialize snapshot value")]
    Serialize {
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The snapshot file could not be read.
    #[error("failed to read snapshot file `{path}`")]
    Read {
        /// The snapshot file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The snapshot file is not valid.
    #[error("failed to parse snapshot file `{path}`")]
    Parse {
        /// The snapshot file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The snapshot file could not be written.
    #[error("failed to write snapshot file `{path}`")]
    Write {
        /// The snapshot file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: atomicwrites::Error<io::Error>,
    },
}

/// A rendered line diff, displayed verbatim.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DisplayDiff(pub(crate) String);

impl fmt::Display for DisplayDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
