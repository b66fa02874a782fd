// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fluent assertions.
//!
//! ```
//! use trellis_harness::expect;
//!
//! # fn main() -> trellis_harness::Result<()> {
//! expect(1 + 1).to_equal(2)?;
//! expect(vec!["a", "b"]).to_contain(&"b")?;
//! expect("hello").not_to_equal("world")?;
//! # Ok(())
//! # }
//! ```
//!
//! Every matcher returns a [`Result`] so it can be propagated with `?`. The error is an
//! [`AssertionMismatch`] whose message shows the expected and received values.

use crate::{
    context::TestContext,
    diff::write_line_diff,
    errors::AssertionMismatch,
    mock::CallHistory,
};
use serde::Serialize;
use std::{error::Error, fmt, panic::Location, rc::Rc, sync::Arc};
use swrite::{SWrite, swrite, swriteln};

/// Starts an assertion about `actual`.
#[track_caller]
pub fn expect<T>(actual: T) -> Expectation<T> {
    Expectation {
        actual,
        location: Location::caller(),
    }
}

/// A value under assertion. Created by [`expect`].
#[must_use = "expectations do nothing unless a matcher is called"]
pub struct Expectation<T> {
    actual: T,
    location: &'static Location<'static>,
}

impl<T> Expectation<T> {
    fn check(&self, pass: bool, message: impl FnOnce() -> String) -> Result<(), AssertionMismatch> {
        if pass {
            Ok(())
        } else {
            Err(AssertionMismatch::new(message(), self.location))
        }
    }
}

impl<T: fmt::Debug> Expectation<T> {
    /// Asserts that the value equals `expected`.
    ///
    /// Values are compared with `PartialEq`, except that NaN equals NaN wherever it appears.
    pub fn to_equal<U>(self, expected: U) -> Result<(), AssertionMismatch>
    where
        T: PartialEq<U>,
        U: fmt::Debug,
    {
        self.check(same_value(&self.actual, &expected), || {
            mismatch_message("to_equal", &expected, &self.actual)
        })
    }

    /// Asserts that the value does not equal `unexpected`.
    pub fn not_to_equal<U>(self, unexpected: U) -> Result<(), AssertionMismatch>
    where
        T: PartialEq<U>,
        U: fmt::Debug,
    {
        self.check(!same_value(&self.actual, &unexpected), || {
            format!(
                "expect(received).not_to_equal(expected)\n\n\
                 Expected: not {unexpected:?}\n\
                 Received: {:?}",
                self.actual
            )
        })
    }

    /// Asserts that the value is the same object as `expected`.
    ///
    /// For references this compares addresses; for `Rc` and `Arc` it compares allocations.
    pub fn to_be(self, expected: T) -> Result<(), AssertionMismatch>
    where
        T: Identity,
    {
        self.check(self.actual.is_same(&expected), || {
            format!(
                "expect(received).to_be(expected)\n\n\
                 Expected: the same object as {expected:?}\n\
                 Received: {:?}",
                self.actual
            )
        })
    }

    /// Asserts that the value is truthy. See [`Truthy`].
    pub fn to_be_truthy(self) -> Result<(), AssertionMismatch>
    where
        T: Truthy,
    {
        self.check(self.actual.is_truthy(), || {
            format!(
                "expect(received).to_be_truthy()\n\nReceived: {:?}",
                self.actual
            )
        })
    }

    /// Asserts that the value is falsy. See [`Truthy`].
    pub fn to_be_falsy(self) -> Result<(), AssertionMismatch>
    where
        T: Truthy,
    {
        self.check(!self.actual.is_truthy(), || {
            format!("expect(received).to_be_falsy()\n\nReceived: {:?}", self.actual)
        })
    }

    /// Asserts that the value is strictly greater than `bound`.
    pub fn to_be_greater_than<U>(self, bound: U) -> Result<(), AssertionMismatch>
    where
        T: PartialOrd<U>,
        U: fmt::Debug,
    {
        self.check(self.actual > bound, || {
            format!(
                "expect(received).to_be_greater_than(expected)\n\n\
                 Expected: > {bound:?}\n\
                 Received: {:?}",
                self.actual
            )
        })
    }

    /// Asserts that the value is strictly less than `bound`.
    pub fn to_be_less_than<U>(self, bound: U) -> Result<(), AssertionMismatch>
    where
        T: PartialOrd<U>,
        U: fmt::Debug,
    {
        self.check(self.actual < bound, || {
            format!(
                "expect(received).to_be_less_than(expected)\n\n\
                 Expected: < {bound:?}\n\
                 Received: {:?}",
                self.actual
            )
        })
    }

    /// Asserts that the collection contains `item`.
    pub fn to_contain<U>(self, item: &U) -> Result<(), AssertionMismatch>
    where
        T: AsRef<[U]>,
        U: PartialEq + fmt::Debug,
    {
        self.check(self.actual.as_ref().contains(item), || {
            format!(
                "expect(received).to_contain(expected)\n\n\
                 Expected item: {item:?}\n\
                 Received: {:#?}",
                self.actual
            )
        })
    }

    /// Asserts that the string contains `needle`.
    pub fn to_contain_str(self, needle: &str) -> Result<(), AssertionMismatch>
    where
        T: AsRef<str>,
    {
        self.check(self.actual.as_ref().contains(needle), || {
            format!(
                "expect(received).to_contain_str(expected)\n\n\
                 Expected substring: {needle:?}\n\
                 Received: {:?}",
                self.actual
            )
        })
    }

    /// Asserts that the value has the given length. See [`Length`].
    pub fn to_have_length(self, expected: usize) -> Result<(), AssertionMismatch>
    where
        T: Length,
    {
        let len = self.actual.length();
        self.check(len == expected, || {
            format!(
                "expect(received).to_have_length(expected)\n\n\
                 Expected length: {expected}\n\
                 Received length: {len}\n\
                 Received: {:?}",
                self.actual
            )
        })
    }

    /// Asserts that the value matches the next snapshot of the running file.
    pub fn to_match_snapshot(self, cx: &TestContext) -> Result<(), AssertionMismatch>
    where
        T: Serialize,
    {
        cx.snapshot(&self.actual)
            .map(|_| ())
            .map_err(|error| AssertionMismatch::new(display_error_chain(&error), self.location))
    }
}

fn same_value<T, U>(actual: &T, expected: &U) -> bool
where
    T: PartialEq<U> + fmt::Debug,
    U: fmt::Debug,
{
    if actual == expected {
        return true;
    }
    // NaN is the only standard value unequal to itself, so values that differ only where NaN
    // appears render identically.
    let actual = format!("{actual:?}");
    actual.contains("NaN") && actual == format!("{expected:?}")
}

fn display_error_chain(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        swrite!(message, "\n\nCaused by:\n  {cause}");
        source = cause.source();
    }
    message
}

impl<V: fmt::Debug> Expectation<Option<V>> {
    /// Asserts that the value is `Some`.
    pub fn to_be_some(self) -> Result<(), AssertionMismatch> {
        self.check(self.actual.is_some(), || {
            "expect(received).to_be_some()\n\nReceived: None".to_owned()
        })
    }

    /// Asserts that the value is `None`.
    pub fn to_be_none(self) -> Result<(), AssertionMismatch> {
        self.check(self.actual.is_none(), || {
            format!("expect(received).to_be_none()\n\nReceived: {:?}", self.actual)
        })
    }
}

impl<V: fmt::Debug, E: fmt::Debug> Expectation<Result<V, E>> {
    /// Asserts that the value is `Ok`.
    pub fn to_be_ok(self) -> Result<(), AssertionMismatch> {
        self.check(self.actual.is_ok(), || {
            format!("expect(received).to_be_ok()\n\nReceived: {:?}", self.actual)
        })
    }

    /// Asserts that the value is `Err`.
    pub fn to_be_err(self) -> Result<(), AssertionMismatch> {
        self.check(self.actual.is_err(), || {
            format!("expect(received).to_be_err()\n\nReceived: {:?}", self.actual)
        })
    }
}

impl<'a, H, A> Expectation<&'a H>
where
    H: CallHistory<Args = A> + ?Sized,
    A: fmt::Debug,
{
    /// Asserts that the mock or spy was called at least once.
    pub fn to_have_been_called(self) -> Result<(), AssertionMismatch> {
        let count = self.actual.call_count();
        self.check(count > 0, || {
            "expect(mock).to_have_been_called()\n\nReceived number of calls: 0".to_owned()
        })
    }

    /// Asserts that the mock or spy was called exactly `times` times.
    pub fn to_have_been_called_times(self, times: usize) -> Result<(), AssertionMismatch> {
        let count = self.actual.call_count();
        self.check(count == times, || {
            format!(
                "expect(mock).to_have_been_called_times(expected)\n\n\
                 Expected number of calls: {times}\n\
                 Received number of calls: {count}"
            )
        })
    }

    /// Asserts that some recorded call had arguments equal to `args`.
    pub fn to_have_been_called_with<U>(self, args: U) -> Result<(), AssertionMismatch>
    where
        A: PartialEq<U>,
        U: fmt::Debug,
    {
        let calls = self.actual.recorded_calls();
        self.check(calls.iter().any(|call| *call == args), || {
            let mut message = format!(
                "expect(mock).to_have_been_called_with(expected)\n\nExpected: {args:?}\n"
            );
            if calls.is_empty() {
                message.push_str("Received: no calls");
            } else {
                message.push_str("Received:");
                for (n, call) in calls.iter().enumerate() {
                    swrite!(message, "\n  {}: {call:?}", n + 1);
                }
            }
            message
        })
    }
}

fn mismatch_message<E: fmt::Debug + ?Sized, R: fmt::Debug + ?Sized>(
    matcher: &str,
    expected: &E,
    received: &R,
) -> String {
    let mut out = format!("expect(received).{matcher}(expected)\n\n");
    let expected = format!("{expected:#?}");
    let received = format!("{received:#?}");
    if expected.contains('\n') || received.contains('\n') {
        swriteln!(out, "Difference (- expected, + received):");
        write_line_diff(&mut out, &expected, &received);
    } else {
        swriteln!(out, "Expected: {expected}");
        swriteln!(out, "Received: {received}");
    }
    out.truncate(out.trim_end().len());
    out
}

/// Object identity, used by [`Expectation::to_be`].
pub trait Identity {
    /// Returns true if `self` and `other` refer to the same object.
    fn is_same(&self, other: &Self) -> bool;
}

impl<T: ?Sized> Identity for &T {
    fn is_same(&self, other: &Self) -> bool {
        std::ptr::eq(*self, *other)
    }
}

impl<T: ?Sized> Identity for Rc<T> {
    fn is_same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Identity for Arc<T> {
    fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

/// Truthiness, used by [`Expectation::to_be_truthy`] and [`Expectation::to_be_falsy`].
///
/// Zero, `false`, `None`, empty strings, NaN and JSON `null` are falsy. Everything else is
/// truthy.
pub trait Truthy {
    /// Returns true if the value is truthy.
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

macro_rules! impl_truthy_int {
    ($($ty:ty),*) => {
        $(
            impl Truthy for $ty {
                fn is_truthy(&self) -> bool {
                    *self != 0
                }
            }
        )*
    };
}

impl_truthy_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Truthy for f32 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for f64 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for str {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.is_some()
    }
}

impl<T: Truthy + ?Sized> Truthy for &T {
    fn is_truthy(&self) -> bool {
        (**self).is_truthy()
    }
}

impl Truthy for serde_json::Value {
    fn is_truthy(&self) -> bool {
        use serde_json::Value;

        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|n| n.is_truthy()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

/// Length of a collection, used by [`Expectation::to_have_length`].
pub trait Length {
    /// Returns the number of elements (or bytes, for strings).
    fn length(&self) -> usize;
}

impl<T> Length for [T] {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<T, const N: usize> Length for [T; N] {
    fn length(&self) -> usize {
        N
    }
}

impl<T> Length for Vec<T> {
    fn length(&self) -> usize {
        self.len()
    }
}

impl Length for str {
    fn length(&self) -> usize {
        self.len()
    }
}

impl Length for String {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<K, V> Length for std::collections::BTreeMap<K, V> {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<K, V, S> Length for std::collections::HashMap<K, V, S> {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<T: Length + ?Sized> Length for &T {
    fn length(&self) -> usize {
        (**self).length()
    }
}
