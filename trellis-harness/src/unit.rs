// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The entry point of a test program.

use crate::{
    context::{MessageSink, StdoutSink},
    snapshot::SnapshotMode,
    tree::{CaseFilter, RunOptions, Suite, TestTree},
};
use camino::Utf8PathBuf;
use std::{
    io::{self, Write},
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};
use trellis_metadata::{CaseStatus, SuiteOutcome, SuiteResult, UnitEnv, UnitMessage};

/// Defines `main` for a test program.
///
/// The argument is a function or closure that registers cases on the root suite. The root suite
/// is named after the program, unless a name is given explicitly.
///
/// ```no_run
/// use trellis_harness::{Suite, expect};
///
/// fn register(s: &mut Suite) {
///     s.case("adds", |_| Ok(expect(1 + 1).to_equal(2)?));
/// }
///
/// trellis_harness::main!(register);
/// ```
#[macro_export]
macro_rules! main {
    ($register:expr $(,)?) => {
        fn main() {
            $crate::run_main(env!("CARGO_CRATE_NAME"), $register)
        }
    };
    (name = $name:expr, $register:expr $(,)?) => {
        fn main() {
            $crate::run_main($name, $register)
        }
    };
}

/// Settings for a test program, normally read from the environment.
#[derive(Clone, Debug)]
pub struct UnitSettings {
    /// True if the program was spawned by the coordinator and must speak the message protocol.
    pub protocol: bool,

    /// The identity of the test file.
    pub test_file: Utf8PathBuf,

    /// Which cases to run.
    pub filter: CaseFilter,

    /// How snapshot comparisons behave.
    pub snapshot_mode: SnapshotMode,
}

impl UnitSettings {
    /// Reads settings from the environment.
    ///
    /// Without [`UnitEnv::TEST_FILE`], the program's own path is used as the file identity.
    pub fn from_env() -> Self {
        let protocol = std::env::var_os(UnitEnv::UNIT).is_some();
        let test_file = std::env::var(UnitEnv::TEST_FILE)
            .ok()
            .map(Utf8PathBuf::from)
            .or_else(|| {
                std::env::current_exe()
                    .ok()
                    .and_then(|exe| Utf8PathBuf::from_path_buf(exe).ok())
            })
            .unwrap_or_else(|| Utf8PathBuf::from("unknown"));
        let update = std::env::var(UnitEnv::UPDATE_SNAPSHOTS)
            .is_ok_and(|value| UnitEnv::is_enabled(&value));

        Self {
            protocol,
            test_file,
            filter: CaseFilter::from_env(),
            snapshot_mode: SnapshotMode::from_update_flag(update),
        }
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            test_file: self.test_file.clone(),
            filter: self.filter.clone(),
            snapshot_mode: self.snapshot_mode,
        }
    }
}

/// Registers and runs a test program, then exits the process.
///
/// Exits with code 0 once the report has been sent in protocol mode. In standalone mode, exits
/// with code 1 if any case failed.
pub fn run_main(name: &str, register: impl FnOnce(&mut Suite)) -> ! {
    let settings = UnitSettings::from_env();
    let code = run_unit(name, register, &settings);
    std::process::exit(code)
}

/// Registers and runs a test program with explicit settings, returning the exit code.
pub fn run_unit(name: &str, register: impl FnOnce(&mut Suite), settings: &UnitSettings) -> i32 {
    let sink: Rc<dyn MessageSink> = if settings.protocol {
        Rc::new(StdoutSink)
    } else {
        Rc::new(StandaloneSink)
    };

    let mut tree = TestTree::new(name);
    let registered = panic::catch_unwind(AssertUnwindSafe(|| {
        tree.register(register);
    }));
    if let Err(payload) = registered {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic with a non-string payload".to_owned());
        let message = format!("failed to load {}: {reason}", settings.test_file);
        if settings.protocol {
            sink.send(UnitMessage::Error { message });
        } else {
            eprintln!("error: {message}");
        }
        return 1;
    }

    let result = tree.run(&settings.run_options(), Rc::clone(&sink));
    if settings.protocol {
        sink.send(UnitMessage::Done {
            results: vec![result],
        });
        0
    } else {
        let mut stdout = io::stdout().lock();
        // Nothing useful can be done if stdout is gone.
        _ = write_standalone_report(&mut stdout, &result);
        match result.outcome() {
            SuiteOutcome::Failed => 1,
            SuiteOutcome::Passed | SuiteOutcome::Empty => 0,
        }
    }
}

/// Prints messages directly when a program runs outside the coordinator.
struct StandaloneSink;

impl MessageSink for StandaloneSink {
    fn send(&self, message: UnitMessage) {
        match message {
            UnitMessage::Log { message } | UnitMessage::Info { message } => println!("{message}"),
            UnitMessage::Error { message } => eprintln!("error: {message}"),
            UnitMessage::Done { .. } => {}
        }
    }
}

fn write_standalone_report(out: &mut impl Write, result: &SuiteResult) -> io::Result<()> {
    for case in &result.cases {
        writeln!(out, "{:>4} {}", case.status, case.full_name())?;
        if let Some(failure) = &case.failure {
            for line in failure.message.lines() {
                writeln!(out, "       {line}")?;
            }
            if let Some(stack) = &failure.stack {
                writeln!(out, "       {stack}")?;
            }
        }
    }
    writeln!(
        out,
        "\n{}: {} passed, {} failed, {} skipped",
        result.suite,
        result.count(CaseStatus::Passed),
        result.count(CaseStatus::Failed),
        result.count(CaseStatus::Skipped),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expect;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn settings(dir: &Utf8TempDir) -> UnitSettings {
        UnitSettings {
            protocol: false,
            test_file: dir.path().join("unit.test"),
            filter: CaseFilter::default(),
            snapshot_mode: SnapshotMode::Compare,
        }
    }

    #[test]
    fn standalone_exit_codes() {
        let dir = Utf8TempDir::new().unwrap();
        let passing = run_unit(
            "ok",
            |s| {
                s.case("a", |_| Ok(()));
            },
            &settings(&dir),
        );
        assert_eq!(passing, 0);

        let failing = run_unit(
            "bad",
            |s| {
                s.case("a", |_| Ok(expect(1).to_equal(2)?));
            },
            &settings(&dir),
        );
        assert_eq!(failing, 1);

        let broken = run_unit("broken", |_| panic!("cannot register"), &settings(&dir));
        assert_eq!(broken, 1);
    }

    #[test]
    fn standalone_report() {
        let dir = Utf8TempDir::new().unwrap();
        let mut tree = TestTree::new("report");
        tree.register(|s| {
            s.case("passes", |_| Ok(()));
            s.case("fails", |_| Err("nope".into()));
            s.skip("later", |_| Ok(()));
        });
        let result = tree.run(
            &settings(&dir).run_options(),
            Rc::new(crate::context::RecordingSink::new()),
        );

        let mut out = Vec::new();
        write_standalone_report(&mut out, &result).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            indoc! {"
                PASS report > passes
                FAIL report > fails
                       nope
                SKIP report > later

                report: 1 passed, 1 failed, 1 skipped
            "}
        );
    }
}
