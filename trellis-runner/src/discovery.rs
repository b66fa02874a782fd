// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery of test files.
//!
//! The main structure in this module is [`TestFileList`].

use crate::{
    errors::{DiscoveryError, FilePatternParseError, WriteEventError},
    write_str::WriteStr,
};
use camino::{Utf8Path, Utf8PathBuf};
use globset::{GlobBuilder, GlobMatcher};
use owo_colors::{OwoColorize, Style};
use std::fmt;
use tracing::debug;
use walkdir::WalkDir;

/// The extension of snapshot files, which are never test files.
const SNAPSHOT_EXTENSION: &str = "snap";

/// A glob pattern selecting test files.
///
/// A file matches if the pattern matches either its path relative to the discovery root, or its
/// file name. `*` does not cross directory separators; use `**` for that.
#[derive(Clone, Debug)]
pub struct FilePattern {
    glob: String,
    matcher: GlobMatcher,
}

impl FilePattern {
    /// The pattern used when none is configured.
    pub const DEFAULT: &'static str = "**/*.test";

    /// Parses a new pattern.
    pub fn new(glob: impl Into<String>) -> Result<Self, FilePatternParseError> {
        let glob = glob.into();
        let matcher = GlobBuilder::new(&glob)
            .literal_separator(true)
            .backslash_escape(false)
            .empty_alternates(true)
            .build()
            .map_err(|error| FilePatternParseError::new(glob.clone(), error))?
            .compile_matcher();
        Ok(Self { glob, matcher })
    }

    /// Returns the glob string.
    pub fn as_str(&self) -> &str {
        &self.glob
    }

    /// Returns true if the file at `relative` (relative to its discovery root) matches.
    pub fn is_match(&self, relative: &Utf8Path) -> bool {
        self.matcher.is_match(relative.as_str())
            || relative
                .file_name()
                .is_some_and(|name| self.matcher.is_match(name))
    }
}

impl Default for FilePattern {
    fn default() -> Self {
        Self::new(Self::DEFAULT).expect("default pattern is valid")
    }
}

impl fmt::Display for FilePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.glob)
    }
}

/// The sorted, de-duplicated list of test files found under a set of roots.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestFileList {
    files: Vec<Utf8PathBuf>,
}

impl TestFileList {
    /// Walks `roots` and collects the files matching `pattern`.
    ///
    /// Every root is checked for existence before any directory is walked. Roots that are files
    /// are included whether or not they match the pattern.
    pub fn discover(
        roots: &[Utf8PathBuf],
        pattern: &FilePattern,
    ) -> Result<Self, DiscoveryError> {
        for root in roots {
            if !root.exists() {
                return Err(DiscoveryError::RootNotFound { root: root.clone() });
            }
        }

        let mut files = Vec::new();
        for root in roots {
            if root.is_file() {
                files.push(root.clone());
                continue;
            }
            debug!(%root, %pattern, "walking discovery root");
            for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
                let entry = entry.map_err(|error| DiscoveryError::Walk {
                    root: root.clone(),
                    error,
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = Utf8Path::from_path(entry.path()).ok_or_else(|| {
                    DiscoveryError::NonUtf8Path {
                        path: entry.path().to_string_lossy().into_owned(),
                    }
                })?;
                if path.extension() == Some(SNAPSHOT_EXTENSION) {
                    continue;
                }
                let relative = path.strip_prefix(root).unwrap_or(path);
                if pattern.is_match(relative) {
                    files.push(path.to_owned());
                }
            }
        }

        files.sort();
        files.dedup();
        debug!(count = files.len(), "discovered test files");
        Ok(Self { files })
    }

    /// Creates a list from already-known files.
    pub fn from_files(files: impl IntoIterator<Item = Utf8PathBuf>) -> Self {
        let mut files: Vec<_> = files.into_iter().collect();
        files.sort();
        files.dedup();
        Self { files }
    }

    /// Returns the number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no files were discovered.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterates over the files in order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Utf8Path> + '_ {
        self.files.iter().map(|file| file.as_path())
    }

    /// Writes the list in the given format.
    pub fn write(
        &self,
        format: ListFormat,
        colorize: bool,
        writer: &mut dyn WriteStr,
    ) -> Result<(), WriteEventError> {
        match format {
            ListFormat::Human => {
                let style = if colorize {
                    Style::new().bold()
                } else {
                    Style::new()
                };
                for file in &self.files {
                    writeln!(writer, "{}", file.style(style))?;
                }
            }
            ListFormat::Json => {
                let json = serde_json::to_string_pretty(&self.files)
                    .expect("a list of paths is always serializable");
                writeln!(writer, "{json}")?;
            }
        }
        writer.write_str_flush()?;
        Ok(())
    }
}

/// Output formats for [`TestFileList::write`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ListFormat {
    /// One path per line.
    #[default]
    Human,

    /// A JSON array of paths.
    Json,
}
