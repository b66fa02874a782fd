// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Body, CaseDecl, CaseFilter, HookKind, Node, Suite};
use crate::{context::TestContext, errors::AssertionMismatch};
use std::{
    any::Any,
    cell::{Cell, RefCell},
    mem,
    panic::{self, AssertUnwindSafe},
    sync::Once,
    time::{Duration, Instant},
};
use trellis_metadata::{CaseResult, CaseStatus, FailureDetail};

thread_local! {
    static CAPTURING_PANICS: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Installs a process-wide panic hook that records the location of panics raised inside bodies
/// instead of printing them. Panics elsewhere go to the previous hook.
fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING_PANICS.with(Cell::get) {
                let location = info.location().map(|l| l.to_string());
                LAST_PANIC_LOCATION.with(|last| *last.borrow_mut() = location);
            } else {
                previous(info);
            }
        }));
    });
}

/// The `before_each` and `after_each` hooks of one suite on the path to the running case.
struct EachFrame {
    before_each: Vec<Body>,
    after_each: Vec<Body>,
}

/// A case's entry in the results, with a status that is written once.
struct CaseRecord {
    result: CaseResult,
}

impl CaseRecord {
    fn new(decl: &CaseDecl, suite_path: &[String]) -> Self {
        Self {
            result: CaseResult {
                id: decl.id.to_string(),
                name: decl.name.clone(),
                suite_path: suite_path.to_vec(),
                status: CaseStatus::Pending,
                failure: None,
                duration: Duration::ZERO,
            },
        }
    }

    fn synthetic(kind: HookKind, suite_path: &[String]) -> Self {
        Self {
            result: CaseResult {
                id: super::CaseId::new_v4().to_string(),
                name: format!("<{kind}>"),
                suite_path: suite_path.to_vec(),
                status: CaseStatus::Pending,
                failure: None,
                duration: Duration::ZERO,
            },
        }
    }

    fn finish(
        mut self,
        status: CaseStatus,
        failure: Option<FailureDetail>,
        duration: Duration,
    ) -> CaseResult {
        debug_assert_eq!(
            self.result.status,
            CaseStatus::Pending,
            "case status is written once"
        );
        debug_assert_eq!(status == CaseStatus::Failed, failure.is_some());
        self.result.status = status;
        self.result.failure = failure;
        self.result.duration = duration;
        self.result
    }
}

pub(super) struct Executor<'a> {
    runtime: tokio::runtime::Runtime,
    cx: TestContext,
    filter: &'a CaseFilter,
    results: Vec<CaseResult>,
}

impl<'a> Executor<'a> {
    pub(super) fn new(
        runtime: tokio::runtime::Runtime,
        cx: TestContext,
        filter: &'a CaseFilter,
    ) -> Self {
        Self {
            runtime,
            cx,
            filter,
            results: Vec::new(),
        }
    }

    pub(super) fn run(mut self, root: Suite) -> Vec<CaseResult> {
        install_panic_hook();
        let mut path = Vec::new();
        let mut frames = Vec::new();
        self.run_suite(root, &mut path, &mut frames);
        self.results
    }

    fn run_suite(
        &mut self,
        mut suite: Suite,
        path: &mut Vec<String>,
        frames: &mut Vec<EachFrame>,
    ) {
        // Suites without selected cases don't run any of their hooks.
        if !suite.has_match(self.filter, path) {
            return;
        }
        path.push(suite.name.clone());
        let hooks = mem::take(&mut suite.hooks);

        let mut aborted = false;
        for mut hook in hooks.before_all {
            if let Err(failure) = self.run_hook(HookKind::BeforeAll, &mut hook, path) {
                tracing::debug!(suite = %suite.name, "before_all hook failed, skipping suite");
                self.results.push(failure);
                aborted = true;
                break;
            }
        }

        frames.push(EachFrame {
            before_each: hooks.before_each,
            after_each: hooks.after_each,
        });
        for child in suite.children {
            match child {
                Node::Case(decl) => {
                    if !self.filter.matches(path, &decl.name) {
                        continue;
                    }
                    if aborted {
                        self.skip_case(&decl, path);
                    } else if self.run_case(decl, path, frames) {
                        // A failing before_each or after_each hook skips the rest of this suite.
                        aborted = true;
                    }
                }
                Node::Suite(child) => {
                    if aborted {
                        self.skip_suite(&child, path);
                    } else {
                        self.run_suite(child, path, frames);
                    }
                }
            }
        }
        frames.pop();

        for mut hook in hooks.after_all {
            if let Err(failure) = self.run_hook(HookKind::AfterAll, &mut hook, path) {
                self.results.push(failure);
            }
        }
        path.pop();
    }

    /// Runs a case with its `before_each` and `after_each` hooks. Returns true if a hook failed.
    fn run_case(&mut self, decl: CaseDecl, path: &[String], frames: &mut [EachFrame]) -> bool {
        let record = CaseRecord::new(&decl, path);
        let Some(mut body) = decl.body else {
            self.results
                .push(record.finish(CaseStatus::Skipped, None, Duration::ZERO));
            return false;
        };

        let start = Instant::now();
        self.cx.set_current_case(Some(record.result.full_name()));
        let mut failure = None;
        let mut hook_failed = false;

        'before: for frame in frames.iter_mut() {
            for hook in &mut frame.before_each {
                if let Err(detail) = self.run_body(hook) {
                    failure = Some(prefix_failure(HookKind::BeforeEach, detail));
                    hook_failed = true;
                    break 'before;
                }
            }
        }
        if failure.is_none() {
            failure = self.run_body(&mut body).err();
        }
        for frame in frames.iter_mut().rev() {
            for hook in &mut frame.after_each {
                if let Err(detail) = self.run_body(hook) {
                    hook_failed = true;
                    failure.get_or_insert(prefix_failure(HookKind::AfterEach, detail));
                }
            }
        }
        self.cx.set_current_case(None);

        let status = if failure.is_some() {
            CaseStatus::Failed
        } else {
            CaseStatus::Passed
        };
        self.results
            .push(record.finish(status, failure, start.elapsed()));
        hook_failed
    }

    fn run_hook(
        &mut self,
        kind: HookKind,
        hook: &mut Body,
        path: &[String],
    ) -> Result<(), CaseResult> {
        let start = Instant::now();
        self.run_body(hook).map_err(|detail| {
            CaseRecord::synthetic(kind, path).finish(
                CaseStatus::Failed,
                Some(detail),
                start.elapsed(),
            )
        })
    }

    fn skip_case(&mut self, decl: &CaseDecl, path: &[String]) {
        self.results
            .push(CaseRecord::new(decl, path).finish(CaseStatus::Skipped, None, Duration::ZERO));
    }

    fn skip_suite(&mut self, suite: &Suite, path: &mut Vec<String>) {
        path.push(suite.name.clone());
        for child in &suite.children {
            match child {
                Node::Case(decl) => {
                    if self.filter.matches(path, &decl.name) {
                        self.skip_case(decl, path);
                    }
                }
                Node::Suite(child) => self.skip_suite(child, path),
            }
        }
        path.pop();
    }

    /// Runs a single body to completion, converting errors and panics into failure details.
    fn run_body(&self, body: &mut Body) -> Result<(), FailureDetail> {
        CAPTURING_PANICS.with(|c| c.set(true));
        LAST_PANIC_LOCATION.with(|last| last.borrow_mut().take());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match body {
            Body::Sync(f) => f(&self.cx),
            Body::Async(f) => self.runtime.block_on(f(self.cx.clone())),
        }));
        CAPTURING_PANICS.with(|c| c.set(false));

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(failure_from_error(&*error)),
            Err(payload) => {
                let location = LAST_PANIC_LOCATION.with(|last| last.borrow_mut().take());
                let detail = FailureDetail::new(panic_message(&*payload));
                Err(match location {
                    Some(location) => detail.with_stack(format!("panicked at {location}")),
                    None => detail,
                })
            }
        }
    }
}

fn prefix_failure(kind: HookKind, detail: FailureDetail) -> FailureDetail {
    FailureDetail {
        message: format!("{kind} failed: {}", detail.message),
        stack: detail.stack,
    }
}

fn failure_from_error(error: &(dyn std::error::Error + 'static)) -> FailureDetail {
    if let Some(mismatch) = error.downcast_ref::<AssertionMismatch>() {
        return FailureDetail::new(mismatch.message())
            .with_stack(format!("at {}", mismatch.location()));
    }

    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str("\n  caused by: ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    FailureDetail::new(message)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked with a non-string payload".to_owned()
    }
}
