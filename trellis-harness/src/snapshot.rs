// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snapshot storage.
//!
//! Snapshots for a test file live next to it, in `<file>.snap`. The file holds a JSON object
//! mapping snapshot keys to stored values. A key is the full name of the case that took the
//! snapshot followed by the snapshot's sequential index within that case, starting at 1: the
//! second snapshot of `math > adds` is stored under `math > adds 2`. Keys never depend on which
//! other cases ran, so filtered runs see the same keys as full runs.

use crate::{diff::line_diff, errors::SnapshotError, errors::DisplayDiff};
use atomicwrites::{AllowOverwrite, AtomicFile};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    io,
    io::Write,
};
use trellis_metadata::SnapshotSummary;

/// The extension appended to a test file's path to form its snapshot file.
pub const SNAPSHOT_EXTENSION: &str = "snap";

/// Whether snapshot comparisons check or overwrite stored values.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SnapshotMode {
    /// Compare against stored values, creating missing ones.
    #[default]
    Compare,

    /// Overwrite stored values that differ.
    Update,
}

impl SnapshotMode {
    /// Returns [`Self::Update`] if `update` is true.
    pub fn from_update_flag(update: bool) -> Self {
        if update { Self::Update } else { Self::Compare }
    }
}

/// The result of a successful snapshot comparison.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SnapshotOutcome {
    /// No value was stored under this key; the received value was written.
    Created,
    /// The received value equals the stored one.
    Matched,
    /// The stored value differed and was overwritten.
    Updated,
}

/// Snapshot values for a single test file.
#[derive(Debug)]
pub struct SnapshotStore {
    path: Utf8PathBuf,
    mode: SnapshotMode,
    loaded: bool,
    entries: BTreeMap<String, Value>,
    counters: HashMap<String, u32>,
    summary: SnapshotSummary,
}

impl SnapshotStore {
    /// Creates a store for the given test file. The snapshot file is read on first use.
    pub fn new(test_file: &Utf8Path, mode: SnapshotMode) -> Self {
        Self {
            path: snapshot_path_for(test_file),
            mode,
            loaded: false,
            entries: BTreeMap::new(),
            counters: HashMap::new(),
            summary: SnapshotSummary::default(),
        }
    }

    /// Returns the path of the snapshot file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the mode this store operates in.
    pub fn mode(&self) -> SnapshotMode {
        self.mode
    }

    /// Returns counts of comparisons performed so far.
    pub fn summary(&self) -> SnapshotSummary {
        self.summary
    }

    /// Compares `value` against the next stored snapshot of the case named `case`.
    ///
    /// `case` is the full name of the running case, or empty for snapshots taken outside any
    /// case. Missing snapshots are created. In [`SnapshotMode::Update`], differing snapshots are
    /// overwritten; otherwise they produce [`SnapshotError::Mismatch`]. Every write goes to disk
    /// immediately.
    pub fn compare<T: Serialize + ?Sized>(
        &mut self,
        case: &str,
        value: &T,
    ) -> Result<SnapshotOutcome, SnapshotError> {
        let received =
            serde_json::to_value(value).map_err(|error| SnapshotError::Serialize { error })?;
        let counter = self.counters.entry(case.to_owned()).or_default();
        *counter += 1;
        let key = snapshot_key(case, *counter);
        self.ensure_loaded()?;

        let outcome = match self.entries.get(&key) {
            Some(stored) if *stored == received => SnapshotOutcome::Matched,
            Some(stored) => match self.mode {
                SnapshotMode::Update => SnapshotOutcome::Updated,
                SnapshotMode::Compare => {
                    let diff = line_diff(&render(stored), &render(&received));
                    return Err(SnapshotError::Mismatch {
                        path: self.path.clone(),
                        key,
                        diff: DisplayDiff(diff),
                    });
                }
            },
            None => SnapshotOutcome::Created,
        };

        match outcome {
            SnapshotOutcome::Matched => self.summary.matched += 1,
            SnapshotOutcome::Created | SnapshotOutcome::Updated => {
                self.entries.insert(key.clone(), received);
                write_entries(&self.path, &self.entries)?;
                if outcome == SnapshotOutcome::Created {
                    self.summary.created += 1;
                } else {
                    self.summary.updated += 1;
                }
            }
        }
        tracing::debug!(path = %self.path, %key, ?outcome, "compared snapshot");
        Ok(outcome)
    }

    fn ensure_loaded(&mut self) -> Result<(), SnapshotError> {
        if self.loaded {
            return Ok(());
        }
        self.entries = match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|error| SnapshotError::Parse {
                    path: self.path.clone(),
                    error,
                })?
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => {
                return Err(SnapshotError::Read {
                    path: self.path.clone(),
                    error,
                });
            }
        };
        self.loaded = true;
        Ok(())
    }
}

/// Returns the snapshot file for a test file.
pub fn snapshot_path_for(test_file: &Utf8Path) -> Utf8PathBuf {
    let mut path = test_file.as_str().to_owned();
    path.push('.');
    path.push_str(SNAPSHOT_EXTENSION);
    path.into()
}

fn snapshot_key(case: &str, index: u32) -> String {
    if case.is_empty() {
        index.to_string()
    } else {
        format!("{case} {index}")
    }
}

fn render(value: &Value) -> String {
    // Values built from serde_json::Value always serialize.
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn write_entries(path: &Utf8Path, entries: &BTreeMap<String, Value>) -> Result<(), SnapshotError> {
    let mut contents = serde_json::to_vec_pretty(entries)
        .map_err(|error| SnapshotError::Serialize { error })?;
    contents.push(b'\n');
    AtomicFile::new(path, AllowOverwrite)
        .write(|f| f.write_all(&contents))
        .map_err(|error| SnapshotError::Write {
            path: path.to_owned(),
            error,
        })
}
