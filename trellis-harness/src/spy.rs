// Copyright (c) The trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spies on replaceable methods.
//!
//! Rust objects can't have their methods swapped out at runtime, so code that wants to be
//! observable declares the relevant method as a [`Method`] field and calls through it. A [`Spy`]
//! installed on that field records every call and delegates to the original implementation,
//! unless an override has been set with [`Spy::mock_implementation`].
//!
//! ```
//! use trellis_harness::{Method, Spy, expect};
//!
//! struct Greeter {
//!     say_hello: Method<String, String>,
//! }
//!
//! # fn main() -> trellis_harness::Result<()> {
//! let greeter = Greeter {
//!     say_hello: Method::new(|name: String| format!("Hello, {name}")),
//! };
//! let spy = Spy::install(&greeter.say_hello);
//! expect(greeter.say_hello.call("Alice".to_owned())).to_equal("Hello, Alice")?;
//! expect(&spy).to_have_been_called_with("Alice")?;
//!
//! spy.restore();
//! greeter.say_hello.call("Bob".to_owned());
//! expect(&spy).to_have_been_called_times(1)?;
//! # Ok(())
//! # }
//! ```

use crate::mock::CallHistory;
use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

type SharedFn<A, R> = Rc<dyn Fn(A) -> R>;

/// A spy's view of a call: the arguments, and the next implementation down the stack.
type SharedLayer<A, R> = Rc<dyn Fn(A, &dyn Fn(A) -> R) -> R>;

/// A method slot whose implementation can be observed by a [`Spy`].
///
/// Spies stack: each installed spy sees calls before the ones installed earlier, and removing a
/// spy relinks the ones around it. Spies can be restored in any order.
pub struct Method<A, R> {
    original: SharedFn<A, R>,
    layers: RefCell<Vec<(u64, SharedLayer<A, R>)>>,
    next_layer_id: Cell<u64>,
}

impl<A: 'static, R: 'static> Method<A, R> {
    /// Creates a new method with the given implementation.
    pub fn new(f: impl Fn(A) -> R + 'static) -> Self {
        Self {
            original: Rc::new(f),
            layers: RefCell::new(Vec::new()),
            next_layer_id: Cell::new(0),
        }
    }

    /// Calls the current implementation.
    pub fn call(&self, args: A) -> R {
        // Take handles so the implementation may itself install or restore spies.
        let layers: Vec<_> = self
            .layers
            .borrow()
            .iter()
            .map(|(_, layer)| Rc::clone(layer))
            .collect();
        call_through(&layers, &self.original, args)
    }
}

impl<A, R> Method<A, R> {
    fn push_layer(&self, layer: SharedLayer<A, R>) -> u64 {
        let id = self.next_layer_id.get();
        self.next_layer_id.set(id + 1);
        self.layers.borrow_mut().push((id, layer));
        id
    }

    fn remove_layer(&self, id: u64) {
        self.layers.borrow_mut().retain(|(layer_id, _)| *layer_id != id);
    }
}

fn call_through<A, R>(layers: &[SharedLayer<A, R>], original: &SharedFn<A, R>, args: A) -> R {
    match layers.split_last() {
        Some((top, below)) => top(args, &|args| call_through(below, original, args)),
        None => original(args),
    }
}

impl<A, R> fmt::Debug for Method<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("spies", &self.layers.borrow().len())
            .finish_non_exhaustive()
    }
}

struct SpyState<A, R> {
    calls: RefCell<Vec<A>>,
    mock_implementation: RefCell<Option<SharedFn<A, R>>>,
}

/// Records calls to a [`Method`] while installed.
///
/// The original implementation is put back by [`Spy::restore`], or when the spy is dropped.
pub struct Spy<'m, A, R> {
    method: &'m Method<A, R>,
    layer_id: u64,
    state: Rc<SpyState<A, R>>,
    installed: Cell<bool>,
}

impl<'m, A: Clone + 'static, R: 'static> Spy<'m, A, R> {
    /// Installs a spy on `method`.
    pub fn install(method: &'m Method<A, R>) -> Self {
        let state = Rc::new(SpyState {
            calls: RefCell::new(Vec::new()),
            mock_implementation: RefCell::new(None),
        });

        let layer = {
            let state = Rc::clone(&state);
            move |args: A, next: &dyn Fn(A) -> R| {
                state.calls.borrow_mut().push(args.clone());
                let mock = state.mock_implementation.borrow().clone();
                match mock {
                    Some(f) => f(args),
                    None => next(args),
                }
            }
        };
        let layer_id = method.push_layer(Rc::new(layer));

        Self {
            method,
            layer_id,
            state,
            installed: Cell::new(true),
        }
    }

    /// Routes subsequent calls to `f` instead of the original implementation. Calls are still
    /// recorded.
    pub fn mock_implementation(&self, f: impl Fn(A) -> R + 'static) {
        *self.state.mock_implementation.borrow_mut() = Some(Rc::new(f));
    }

    /// Routes subsequent calls back to the original implementation.
    pub fn clear_mock_implementation(&self) {
        *self.state.mock_implementation.borrow_mut() = None;
    }

    /// Returns the arguments of every recorded call.
    pub fn calls(&self) -> Vec<A> {
        self.state.calls.borrow().clone()
    }

    /// Returns true if some recorded call had arguments equal to `args`.
    pub fn was_called_with<U>(&self, args: &U) -> bool
    where
        A: PartialEq<U>,
    {
        self.state.calls.borrow().iter().any(|call| call == args)
    }

    /// Returns true while the spy is installed.
    pub fn is_installed(&self) -> bool {
        self.installed.get()
    }
}

impl<A, R> Spy<'_, A, R> {
    /// Stops observing the method. Recorded calls are kept.
    ///
    /// Other spies on the same method stay installed. Restoring more than once has no further
    /// effect.
    pub fn restore(&self) {
        if self.installed.replace(false) {
            self.method.remove_layer(self.layer_id);
        }
    }
}

impl<A, R> Drop for Spy<'_, A, R> {
    fn drop(&mut self) {
        self.restore();
    }
}

impl<A: Clone + 'static, R: 'static> CallHistory for Spy<'_, A, R> {
    type Args = A;

    fn recorded_calls(&self) -> Vec<A> {
        self.calls()
    }

    fn call_count(&self) -> usize {
        self.state.calls.borrow().len()
    }
}

impl<A: fmt::Debug, R> fmt::Debug for Spy<'_, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spy")
            .field("installed", &self.installed.get())
            .field("calls", &self.state.calls.borrow())
            .finish_non_exhaustive()
    }
}

/// Runs `f` with a spy installed on `method`, restoring it afterwards.
pub fn spy_on<A: Clone + 'static, R: 'static, T>(
    method: &Method<A, R>,
    f: impl FnOnce(&Spy<'_, A, R>) -> T,
) -> T {
    let spy = Spy::install(method);
    f(&spy)
}
