// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{config::get_num_cpus, errors::TestThreadsParseError};
use serde::Deserialize;
use std::{cmp::Ordering, fmt, str::FromStr};

/// Type for the test-threads config key: the ceiling on concurrently running units.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TestThreads {
    /// Run a specified number of units at a time.
    Count(usize),

    /// Run as many units at a time as there are logical CPUs.
    NumCpus,

    /// Run half as many units at a time as there are logical CPUs, and at least one.
    HalfNumCpus,
}

impl TestThreads {
    /// Gets the actual number of units computed at runtime.
    pub fn compute(self) -> usize {
        match self {
            Self::Count(threads) => threads,
            Self::NumCpus => get_num_cpus(),
            Self::HalfNumCpus => (get_num_cpus() / 2).max(1),
        }
    }
}

impl Default for TestThreads {
    fn default() -> Self {
        Self::HalfNumCpus
    }
}

impl FromStr for TestThreads {
    type Err = TestThreadsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "num-cpus" => return Ok(Self::NumCpus),
            "half-num-cpus" => return Ok(Self::HalfNumCpus),
            _ => {}
        }

        match s.parse::<isize>() {
            Err(e) => Err(TestThreadsParseError::new(format!(
                "Error: {e} parsing {s}"
            ))),
            Ok(0) => Err(TestThreadsParseError::new("jobs may not be 0")),
            Ok(j) if j < 0 => Ok(TestThreads::Count(
                (get_num_cpus() as isize + j).max(1) as usize,
            )),
            Ok(j) => Ok(TestThreads::Count(j as usize)),
        }
    }
}

impl fmt::Display for TestThreads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(threads) => write!(f, "{threads}"),
            Self::NumCpus => write!(f, "num-cpus"),
            Self::HalfNumCpus => write!(f, "half-num-cpus"),
        }
    }
}

impl<'de> Deserialize<'de> for TestThreads {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = TestThreads;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    formatter,
                    "an integer, or the string \"num-cpus\" or \"half-num-cpus\""
                )
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match v {
                    "num-cpus" => Ok(TestThreads::NumCpus),
                    "half-num-cpus" => Ok(TestThreads::HalfNumCpus),
                    _ => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Str(v),
                        &self,
                    )),
                }
            }

            // Note that TOML uses i64, not u64.
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match v.cmp(&0) {
                    Ordering::Greater => Ok(TestThreads::Count(v as usize)),
                    Ordering::Less => Ok(TestThreads::Count(
                        (get_num_cpus() as i64 + v).max(1) as usize,
                    )),
                    Ordering::Equal => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Signed(v),
                        &self,
                    )),
                }
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                match i64::try_from(v) {
                    Ok(v) => self.visit_i64(v),
                    Err(_) => Err(serde::de::Error::invalid_value(
                        serde::de::Unexpected::Unsigned(v),
                        &self,
                    )),
                }
            }
        }

        deserializer.deserialize_any(V)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrellisConfig;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use test_case::test_case;

    #[test_case(
        indoc! {r#"
            [run]
            test-threads = -1
        "#},
        Some((get_num_cpus() as isize - 1).max(1) as usize)

        ; "negative"
    )]
    #[test_case(
        indoc! {r#"
            [run]
            test-threads = 2
        "#},
        Some(2)

        ; "positive"
    )]
    #[test_case(
        indoc! {r#"
            [run]
            test-threads = 0
        "#},
        None

        ; "zero"
    )]
    #[test_case(
        indoc! {r#"
            [run]
            test-threads = "num-cpus"
        "#},
        Some(get_num_cpus())

        ; "num-cpus"
    )]
    #[test_case(
        "",
        Some((get_num_cpus() / 2).max(1))

        ; "default is half num-cpus"
    )]
    fn parse_test_threads(config_contents: &str, n_threads: Option<usize>) {
        let dir = Utf8TempDir::new().unwrap();
        let config_file = dir.path().join("trellis.toml");
        std::fs::write(&config_file, config_contents).unwrap();

        let config = TrellisConfig::from_sources(dir.path(), Some(&config_file));
        match n_threads {
            None => assert!(config.is_err()),
            Some(n) => assert_eq!(config.unwrap().run().test_threads().compute(), n),
        }
    }

    #[test_case("4", Some(TestThreads::Count(4)) ; "count")]
    #[test_case("num-cpus", Some(TestThreads::NumCpus) ; "num cpus")]
    #[test_case("half-num-cpus", Some(TestThreads::HalfNumCpus) ; "half num cpus")]
    #[test_case("0", None ; "zero")]
    #[test_case("many", None ; "not a number")]
    fn from_str(input: &str, expected: Option<TestThreads>) {
        assert_eq!(input.parse::<TestThreads>().ok(), expected);
    }
}
