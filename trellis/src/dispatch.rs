// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, Result},
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};
use std::time::Duration;
use tracing::debug;
use trellis_metadata::TrellisExitCode;
use trellis_runner::{
    config::{TestThreads, TrellisConfig, parse_wrapper},
    discovery::{FilePattern, ListFormat, TestFileList},
    reporter::ReporterBuilder,
    runner::{RunFilter, TestRunnerBuilder},
};

/// A parallel runner for trellis test programs.
///
/// Each test file runs in its own process. Results are reported as files finish.
#[derive(Debug, Parser)]
#[command(version, name = "trellis")]
pub struct TrellisApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl TrellisApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code on success.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.command {
            Command::List(opts) => opts.exec(&self.config_opts, output, output_writer),
            Command::Run(opts) => opts.exec(&self.config_opts, output, output_writer),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the test files that would be run
    List(ListOpts),

    /// Run test files
    ///
    /// Each file is run in its own process, with a bounded number of processes running at a
    /// time.
    Run(RunOpts),
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: .config/trellis.toml in the current directory]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self) -> Result<TrellisConfig> {
        let current_dir =
            std::env::current_dir().map_err(|err| ExpectedError::CurrentDirInvalid { err })?;
        let current_dir = Utf8PathBuf::try_from(current_dir)
            .map_err(|err| ExpectedError::CurrentDirNotUtf8 { err })?;
        let config = TrellisConfig::from_sources(current_dir, self.config_file.as_deref())?;
        debug!(config_file = %config.config_file(), "loaded config");
        Ok(config)
    }
}

#[derive(Debug, Args)]
struct DiscoveryOpts {
    /// Files or directories to search for test files
    #[arg(value_name = "PATHS", default_value = ".")]
    paths: Vec<Utf8PathBuf>,

    /// Glob that test file paths must match [default: from config]
    #[arg(long, value_name = "GLOB")]
    pattern: Option<String>,
}

impl DiscoveryOpts {
    fn discover(&self, config: &TrellisConfig) -> Result<(TestFileList, FilePattern)> {
        let pattern = match &self.pattern {
            Some(pattern) => FilePattern::new(pattern.as_str())?,
            None => config.run().pattern().clone(),
        };
        let file_list = TestFileList::discover(&self.paths, &pattern)?;
        debug!(files = file_list.len(), %pattern, "discovered test files");
        Ok((file_list, pattern))
    }
}

#[derive(Debug, Args)]
struct ListOpts {
    #[clap(flatten)]
    discovery: DiscoveryOpts,

    /// Output format
    #[arg(long, value_enum, default_value_t, value_name = "FMT")]
    message_format: MessageFormat,
}

impl ListOpts {
    fn exec(
        self,
        config_opts: &ConfigOpts,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let config = config_opts.make_config()?;
        let (file_list, _) = self.discovery.discover(&config)?;

        let colorize = output.color.should_colorize(supports_color::Stream::Stdout);
        let mut writer = output_writer.stdout_writer();
        file_list.write(self.message_format.to_list_format(), colorize, &mut writer)?;
        Ok(TrellisExitCode::OK)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum MessageFormat {
    /// One path per line
    #[default]
    Human,

    /// A JSON array of paths
    Json,
}

impl MessageFormat {
    fn to_list_format(self) -> ListFormat {
        match self {
            Self::Human => ListFormat::Human,
            Self::Json => ListFormat::Json,
        }
    }
}

#[derive(Debug, Args)]
struct RunOpts {
    #[clap(flatten)]
    discovery: DiscoveryOpts,

    /// Only run cases inside suites whose name contains this string
    #[arg(long, value_name = "SUBSTRING")]
    suite: Option<String>,

    /// Only run cases whose name contains this string
    #[arg(long, value_name = "SUBSTRING")]
    case: Option<String>,

    /// Number of test files to run simultaneously [possible values: integer (negative values
    /// count down from the number of CPUs), "num-cpus", "half-num-cpus"] [default: from config]
    #[arg(
        long,
        short = 'j',
        visible_alias = "jobs",
        value_name = "N",
        env = "TRELLIS_TEST_THREADS",
        allow_negative_numbers = true
    )]
    test_threads: Option<TestThreads>,

    /// Kill a test file's process if it runs longer than this, e.g. "30s" [default: from config]
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    unit_timeout: Option<Duration>,

    /// Command to run each test file through, e.g. "node --no-warnings" [default: from config]
    #[arg(long, value_name = "COMMAND")]
    wrapper: Option<String>,

    /// Overwrite snapshots that do not match instead of failing
    #[arg(
        long,
        short = 'u',
        env = "TRELLIS_UPDATE_SNAPSHOTS",
        value_parser = BoolishValueParser::new()
    )]
    update_snapshots: bool,
}

impl RunOpts {
    fn exec(
        self,
        config_opts: &ConfigOpts,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let config = config_opts.make_config()?;
        let (file_list, pattern) = self.discovery.discover(&config)?;
        if file_list.is_empty() {
            return Err(ExpectedError::NoTestsRun {
                pattern: pattern.to_string(),
            });
        }

        let wrapper = match &self.wrapper {
            Some(wrapper) => parse_wrapper(wrapper)?,
            None => config.run().wrapper().to_vec(),
        };

        let mut builder = TestRunnerBuilder::default();
        builder
            .set_test_threads(self.test_threads.unwrap_or(config.run().test_threads()))
            .set_unit_timeout(self.unit_timeout.or(config.run().unit_timeout()))
            .set_wrapper(wrapper)
            .set_filter(RunFilter::new(self.suite, self.case))
            .set_update_snapshots(self.update_snapshots);
        let runner = builder.build(&file_list)?;

        let mut reporter = ReporterBuilder::default()
            .set_colorize(output.color.should_colorize(supports_color::Stream::Stdout))
            .set_verbose(output.verbose)
            .build();
        let mut writer = output_writer.stdout_writer();

        // The run cannot be interrupted, so the first write error is kept and reported once
        // every unit has finished.
        let mut write_error = None;
        let run_stats = runner.execute(|event| {
            if write_error.is_none() {
                if let Err(err) = reporter.report_event(&event, &mut writer) {
                    write_error = Some(err);
                }
            }
        });
        if let Some(err) = write_error {
            return Err(err.into());
        }

        if run_stats.is_success() {
            Ok(TrellisExitCode::OK)
        } else {
            Err(ExpectedError::TestRunFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(&["trellis", "list"] ; "list with defaults")]
    #[test_case(&["trellis", "list", "tests", "--message-format", "json"] ; "list json")]
    #[test_case(&["trellis", "run"] ; "run with defaults")]
    #[test_case(&["trellis", "run", "-j", "4", "--unit-timeout", "30s"] ; "run with limits")]
    #[test_case(&["trellis", "run", "-j", "half-num-cpus"] ; "run with half the cpus")]
    #[test_case(&["trellis", "run", "-j", "-1"] ; "run with all but one cpu")]
    #[test_case(&["trellis", "-v", "run", "--suite", "math", "--case", "adds"] ; "run with filters")]
    #[test_case(&["trellis", "run", "--wrapper", "node --no-warnings", "-u"] ; "run with wrapper")]
    #[test_case(&["trellis", "--config-file", "ci.toml", "run", "a", "b"] ; "run with config file")]
    fn valid_arguments(args: &[&str]) {
        if let Err(err) = TrellisApp::try_parse_from(args) {
            panic!("{args:?} should parse: {err}");
        }
    }

    #[test_case(&["trellis"] ; "missing subcommand")]
    #[test_case(&["trellis", "run", "-j", "many"] ; "invalid test threads")]
    #[test_case(&["trellis", "run", "--unit-timeout", "soon"] ; "invalid timeout")]
    #[test_case(&["trellis", "list", "--message-format", "xml"] ; "invalid message format")]
    fn invalid_arguments(args: &[&str]) {
        assert!(
            TrellisApp::try_parse_from(args).is_err(),
            "{args:?} should not parse"
        );
    }

    #[test]
    fn run_options_are_parsed() {
        let app = TrellisApp::try_parse_from([
            "trellis",
            "run",
            "-j",
            "3",
            "--unit-timeout",
            "1m 30s",
            "--suite",
            "math",
        ])
        .expect("arguments are valid");
        let Command::Run(opts) = app.command else {
            panic!("expected the run subcommand");
        };
        assert_eq!(opts.test_threads, Some(TestThreads::Count(3)));
        assert_eq!(opts.unit_timeout, Some(Duration::from_secs(90)));
        assert_eq!(opts.suite.as_deref(), Some("math"));
        assert_eq!(opts.case, None);
        assert_eq!(opts.discovery.paths, vec![Utf8PathBuf::from(".")]);
    }

    #[test]
    fn boolean_env_vars_accept_numbers() {
        // SAFETY: no other test reads or writes these variables.
        unsafe {
            std::env::set_var("TRELLIS_UPDATE_SNAPSHOTS", "1");
            std::env::set_var("TRELLIS_VERBOSE", "0");
        }
        let parsed = TrellisApp::try_parse_from(["trellis", "run"]);
        unsafe {
            std::env::remove_var("TRELLIS_UPDATE_SNAPSHOTS");
            std::env::remove_var("TRELLIS_VERBOSE");
        }

        let app = parsed.expect("numeric booleans are accepted");
        assert!(!app.output.verbose);
        let Command::Run(opts) = app.command else {
            panic!("expected the run subcommand");
        };
        assert!(opts.update_snapshots);
    }

    fn exec(args: &[&str]) -> (Result<i32>, String) {
        let app = TrellisApp::try_parse_from(args).expect("arguments are valid");
        let output = app.init_output();
        let mut output_writer = OutputWriter::Test { stdout: Vec::new() };
        let result = app.exec(output, &mut output_writer);
        let OutputWriter::Test { stdout } = output_writer else {
            unreachable!("the writer was created as a test writer");
        };
        (result, String::from_utf8(stdout).expect("stdout is UTF-8"))
    }

    #[test]
    fn list_prints_discovered_files() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        for name in ["b.test", "a.test", "notes.txt"] {
            std::fs::write(dir.path().join(name), "").expect("wrote file");
        }

        let (result, stdout) =
            exec(&["trellis", "--color", "never", "list", dir.path().as_str()]);
        assert_eq!(result.expect("list succeeded"), TrellisExitCode::OK);
        assert_eq!(
            stdout,
            format!("{dir}/a.test\n{dir}/b.test\n", dir = dir.path())
        );
    }

    #[test]
    fn missing_root_is_a_discovery_failure() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let missing = dir.path().join("missing");

        let (result, _) = exec(&["trellis", "list", missing.as_str()]);
        let err = result.expect_err("discovery fails");
        assert_eq!(err.process_exit_code(), TrellisExitCode::DISCOVERY_FAILED);
    }

    #[test]
    fn run_without_files_reports_no_tests() {
        let dir = Utf8TempDir::new().expect("created temp dir");

        let (result, _) = exec(&["trellis", "run", dir.path().as_str()]);
        let err = result.expect_err("nothing to run");
        assert_eq!(err.process_exit_code(), TrellisExitCode::NO_TESTS_RUN);
    }

    #[cfg(unix)]
    #[test]
    fn crashed_unit_fails_the_run() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        std::fs::write(dir.path().join("crash.test"), "exit 3\n").expect("wrote file");

        let (result, stdout) = exec(&[
            "trellis",
            "--color",
            "never",
            "run",
            "--wrapper",
            "sh",
            dir.path().as_str(),
        ]);
        let err = result.expect_err("the run fails");
        assert_eq!(err.process_exit_code(), TrellisExitCode::TEST_RUN_FAILED);
        assert!(
            stdout.contains("unit exited with code 3 without reporting results"),
            "unexpected report:\n{stdout}"
        );
        assert!(
            stdout.contains("Test Suites: 1 failed, 1 total"),
            "the summary goes to stdout:\n{stdout}"
        );
    }
}
