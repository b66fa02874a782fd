// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{cell::RefCell, fmt};

/// A recorded history of calls, shared by [`Mock`] and [`Spy`](crate::Spy).
///
/// Used by the call matchers on [`Expectation`](crate::Expectation).
pub trait CallHistory {
    /// The arguments of a single call. Functions with several arguments use a tuple.
    type Args;

    /// Returns the arguments of every call so far, oldest first.
    fn recorded_calls(&self) -> Vec<Self::Args>;

    /// Returns the number of calls so far.
    fn call_count(&self) -> usize;
}

type Implementation<A, R> = Box<dyn FnMut(&A) -> R>;

/// A stand-in function that records its calls.
///
/// Arguments are passed as a single value; use a tuple for several arguments.
///
/// ```
/// use trellis_harness::{Mock, expect};
///
/// # fn main() -> trellis_harness::Result<()> {
/// let add = Mock::<(i32, i32), i32>::new().implementation(|(a, b)| a + b);
/// expect(add.call((1, 2))).to_equal(3)?;
/// expect(&add).to_have_been_called_with((1, 2))?;
/// # Ok(())
/// # }
/// ```
pub struct Mock<A, R> {
    calls: RefCell<Vec<A>>,
    implementation: RefCell<Implementation<A, R>>,
}

impl<A: 'static, R: Default + 'static> Mock<A, R> {
    /// Creates a mock that returns `R::default()`.
    pub fn new() -> Self {
        Self::with_implementation(|_| R::default())
    }
}

impl<A: 'static, R: Default + 'static> Default for Mock<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static, R: 'static> Mock<A, R> {
    /// Creates a mock that computes its return value with `f`.
    pub fn with_implementation(f: impl FnMut(&A) -> R + 'static) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            implementation: RefCell::new(Box::new(f)),
        }
    }

    /// Makes every subsequent call return a clone of `value`.
    pub fn returning(self, value: R) -> Self
    where
        R: Clone,
    {
        self.implementation(move |_| value.clone())
    }

    /// Makes every subsequent call compute its return value with `f`.
    pub fn implementation(self, f: impl FnMut(&A) -> R + 'static) -> Self {
        self.set_implementation(f);
        self
    }

    /// Replaces the implementation in place.
    pub fn set_implementation(&self, f: impl FnMut(&A) -> R + 'static) {
        *self.implementation.borrow_mut() = Box::new(f);
    }

    /// Calls the mock, recording `args`.
    ///
    /// The call is recorded before the implementation runs, so it is kept even if the
    /// implementation panics.
    ///
    /// # Panics
    ///
    /// Panics if the implementation calls or resets the same mock.
    pub fn call(&self, args: A) -> R {
        let index = {
            let mut calls = self.calls.borrow_mut();
            calls.push(args);
            calls.len() - 1
        };
        let calls = self.calls.borrow();
        let mut implementation = self.implementation.borrow_mut();
        (*implementation)(&calls[index])
    }

    /// Returns a closure that forwards to [`Self::call`], for passing the mock to code under test.
    pub fn as_fn(&self) -> impl Fn(A) -> R + '_ {
        move |args| self.call(args)
    }

    /// Returns the arguments of every call so far.
    pub fn calls(&self) -> Vec<A>
    where
        A: Clone,
    {
        self.calls.borrow().clone()
    }

    /// Returns true if the mock was called at least once.
    pub fn was_called(&self) -> bool {
        !self.calls.borrow().is_empty()
    }

    /// Returns true if some call had arguments equal to `args`.
    pub fn was_called_with<U>(&self, args: &U) -> bool
    where
        A: PartialEq<U>,
    {
        self.calls.borrow().iter().any(|call| call == args)
    }

    /// Forgets all recorded calls. The implementation is kept.
    pub fn reset(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl<A: Clone + 'static, R: 'static> CallHistory for Mock<A, R> {
    type Args = A;

    fn recorded_calls(&self) -> Vec<A> {
        self.calls()
    }

    fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl<A: fmt::Debug, R> fmt::Debug for Mock<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mock")
            .field("calls", &self.calls.borrow())
            .finish_non_exhaustive()
    }
}
