// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use trellis_metadata::UnitEnv;

/// Selects which cases of a tree run.
///
/// Both filters are substring matches. The suite filter matches if any suite on the case's path
/// (including the root suite) contains it; the case filter matches against the case name. A case
/// runs if it matches both. Cases that don't match are omitted from results entirely.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CaseFilter {
    suite: Option<String>,
    case: Option<String>,
}

impl CaseFilter {
    /// Creates a new filter. Empty strings are treated as absent.
    pub fn new(suite: Option<String>, case: Option<String>) -> Self {
        Self {
            suite: suite.filter(|s| !s.is_empty()),
            case: case.filter(|s| !s.is_empty()),
        }
    }

    /// Reads the filter from the environment of an execution unit.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var(UnitEnv::SUITE_FILTER).ok(),
            std::env::var(UnitEnv::CASE_FILTER).ok(),
        )
    }

    /// Returns the suite filter.
    pub fn suite(&self) -> Option<&str> {
        self.suite.as_deref()
    }

    /// Returns the case filter.
    pub fn case(&self) -> Option<&str> {
        self.case.as_deref()
    }

    /// Returns true if this filter selects every case.
    pub fn is_empty(&self) -> bool {
        self.suite.is_none() && self.case.is_none()
    }

    /// Returns true if the case with the given suite path and name is selected.
    pub fn matches(&self, suite_path: &[String], case_name: &str) -> bool {
        let suite_matches = match &self.suite {
            Some(filter) => suite_path.iter().any(|suite| suite.contains(filter.as_str())),
            None => true,
        };
        let case_matches = match &self.case {
            Some(filter) => case_name.contains(filter.as_str()),
            None => true,
        };
        suite_matches && case_matches
    }
}
