// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::TestThreads;
use crate::{
    discovery::FilePattern,
    errors::{ConfigParseError, ConfigParseErrorKind, WrapperParseError},
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{collections::BTreeSet, sync::LazyLock, time::Duration};
use tracing::warn;

/// Gets the number of available CPUs and caches the value.
#[inline]
pub fn get_num_cpus() -> usize {
    static NUM_CPUS: LazyLock<usize> =
        LazyLock::new(|| match std::thread::available_parallelism() {
            Ok(count) => count.into(),
            Err(err) => {
                warn!("unable to determine num-cpus ({err}), assuming 1 logical CPU");
                1
            }
        });

    *NUM_CPUS
}

/// Splits a wrapper command line such as `node --enable-source-maps` into its arguments.
pub fn parse_wrapper(input: &str) -> Result<Vec<String>, WrapperParseError> {
    let args = shell_words::split(input).map_err(|error| WrapperParseError::Split {
        input: input.to_owned(),
        error,
    })?;
    if args.is_empty() {
        return Err(WrapperParseError::Empty);
    }
    Ok(args)
}

/// Overall configuration for trellis.
///
/// This is the root data structure for trellis configuration. Command-line arguments override
/// what is read here.
#[derive(Clone, Debug)]
pub struct TrellisConfig {
    config_file: Utf8PathBuf,
    run: RunConfig,
}

impl TrellisConfig {
    /// The default location of the config within the project root: `.config/trellis.toml`.
    pub const CONFIG_PATH: &'static str = ".config/trellis.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Project-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Reads the trellis config from the given file, or if not specified from
    /// `.config/trellis.toml` under the project root.
    ///
    /// An explicitly specified file must exist. The default location is optional.
    pub fn from_sources(
        project_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let project_root = project_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = project_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (deserialized, ignored) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !ignored.is_empty() {
            let keys = ignored.into_iter().collect::<Vec<_>>().join(", ");
            warn!("ignoring unknown configuration keys in {config_file}: {keys}");
        }

        let run = RunConfig::from_deserialize(deserialized.run)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        Ok(Self { config_file, run })
    }

    /// Returns the default trellis config.
    pub fn default_config(project_root: impl AsRef<Utf8Path>) -> Self {
        let builder = Self::make_default_config();
        let (deserialized, _) = Self::build_and_deserialize_config(&builder)
            .expect("default config is always valid");
        let run = RunConfig::from_deserialize(deserialized.run)
            .expect("default config is always valid");
        Self {
            config_file: project_root.as_ref().join(Self::CONFIG_PATH),
            run,
        }
    }

    /// Returns the config file this was read from. The file may not exist.
    pub fn config_file(&self) -> &Utf8Path {
        &self.config_file
    }

    /// Returns the `[run]` section.
    pub fn run(&self) -> &RunConfig {
        &self.run
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(TrellisConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: TrellisConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // serde_path_to_error already tracks the key, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

/// The `[run]` section of the config.
#[derive(Clone, Debug)]
pub struct RunConfig {
    test_threads: TestThreads,
    pattern: FilePattern,
    unit_timeout: Option<Duration>,
    wrapper: Vec<String>,
}

impl RunConfig {
    fn from_deserialize(de: RunConfigDeserialize) -> Result<Self, ConfigParseErrorKind> {
        let pattern = match de.pattern {
            Some(pattern) => FilePattern::new(pattern)?,
            None => FilePattern::default(),
        };
        Ok(Self {
            test_threads: de.test_threads.unwrap_or_default(),
            pattern,
            unit_timeout: de.unit_timeout,
            wrapper: de.wrapper,
        })
    }

    /// Returns the ceiling on concurrently running units.
    pub fn test_threads(&self) -> TestThreads {
        self.test_threads
    }

    /// Returns the pattern test files are discovered with.
    pub fn pattern(&self) -> &FilePattern {
        &self.pattern
    }

    /// Returns the time after which a unit is terminated, if any.
    pub fn unit_timeout(&self) -> Option<Duration> {
        self.unit_timeout
    }

    /// Returns the wrapper command test files are run through. Empty if files are executed
    /// directly.
    pub fn wrapper(&self) -> &[String] {
        &self.wrapper
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TrellisConfigDeserialize {
    #[serde(default)]
    run: RunConfigDeserialize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunConfigDeserialize {
    #[serde(default)]
    test_threads: Option<TestThreads>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default, with = "humantime_serde")]
    unit_timeout: Option<Duration>,
    #[serde(default)]
    wrapper: Vec<String>,
}
