//! `LazyBox` - a value computed on first read, at most once, from any thread.
//!
//! Stores either the initializer `F: FnOnce() -> T` or the value `T`, behind a
//! one-shot gate that elects exactly one thread to run the initializer. Threads
//! arriving while it runs block until the value is published.
//!
//! If the initializer panics, the panic propagates to the thread that ran it
//! and the box is poisoned: every later read panics (or, through
//! [`LazyBox::try_force`], returns [`PoisonError`]). The initializer never
//! runs a second time.

mod state;



use core::fmt;
use core::ops::Deref;
use std::panic::RefUnwindSafe;

use super::error::{PoisonError, POISON_PANIC_MSG};
use crate::sync::gate::{Entry, Gate};
use crate::sync::UnsafeCell;
use state::LazyState;

/// A thread-safe lazily computed value.
///
/// # Examples
///
/// ```
/// use lazybox::LazyBox;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// static CALLS: AtomicUsize = AtomicUsize::new(0);
///
/// let answer = LazyBox::new(|| {
///     CALLS.fetch_add(1, Ordering::SeqCst);
///     6 * 7
/// });
///
/// assert_eq!(CALLS.load(Ordering::SeqCst), 0);
/// assert_eq!(answer.value(), 42);
/// assert_eq!(*answer, 42);
/// assert_eq!(CALLS.load(Ordering::SeqCst), 1);
/// ```
///
/// Re-entrant reads from inside the initializer are not supported: the
/// nested read panics instead of deadlocking, which poisons the box.
pub struct LazyBox<T, F = fn() -> T> {
    gate: Gate,
    state: UnsafeCell<LazyState<T, F>>,
}

// SAFETY: `state` is only written by the thread holding the gate's winner
// guard, and only read through `&self` after the gate reports `COMPLETE`
// (acquire), at which point it is never written again. Shared readers on
// other threads therefore need `T: Sync`; the value may have been produced on
// another thread and the initializer may run on any thread, hence `T: Send`
// and `F: Send`.
unsafe impl<T: Send + Sync, F: Send> Sync for LazyBox<T, F> {}

impl<T: RefUnwindSafe + std::panic::UnwindSafe, F: std::panic::UnwindSafe> RefUnwindSafe
    for LazyBox<T, F>
{
}

impl<T, F: FnOnce() -> T> LazyBox<T, F> {
    /// Creates a new `LazyBox` that will compute its value with `init`.
    ///
    /// `init` is not called until the first read.
    #[cfg(not(loom))]
    #[inline]
    pub const fn new(init: F) -> Self {
        Self {
            gate: Gate::new(),
            state: UnsafeCell::new(LazyState::Pending(init)),
        }
    }

    /// Creates a new `LazyBox` that will compute its value with `init`.
    ///
    /// `init` is not called until the first read.
    #[cfg(loom)]
    pub fn new(init: F) -> Self {
        Self {
            gate: Gate::new(),
            state: UnsafeCell::new(LazyState::Pending(init)),
        }
    }

    /// Returns a clone of the value, computing it on first access.
    ///
    /// # Panics
    ///
    /// Panics if the initializer panics (on the thread that ran it) or
    /// panicked earlier (on every other caller).
    #[inline]
    pub fn value(&self) -> T
    where
        T: Clone,
    {
        self.force().clone()
    }

    /// Returns a reference to the value, computing it on first access.
    ///
    /// Blocks while another thread is computing the value.
    ///
    /// # Panics
    ///
    /// Panics if the box is poisoned, or if called from inside its own
    /// initializer.
    #[inline]
    pub fn force(&self) -> &T {
        match self.try_force() {
            Ok(value) => value,
            Err(_) => panic!("{}", POISON_PANIC_MSG),
        }
    }

    /// Like [`force`](Self::force), but reports a poisoned box as an error.
    ///
    /// A panic raised by the initializer during this very call still
    /// unwinds through the caller.
    pub fn try_force(&self) -> Result<&T, PoisonError> {
        match self.gate.enter() {
            Entry::Complete => {}
            Entry::Poisoned => return Err(PoisonError),
            Entry::Winner(guard) => {
                // SAFETY: winning the gate grants exclusive access to `state`
                // until the guard is released.
                let pending = self.state.with_mut(|state| unsafe { (*state).take_pending() });
                let init = match pending {
                    Some(init) => init,
                    None => unreachable!("LazyBox gate elected a winner without a pending initializer"),
                };

                // If `init` unwinds, `state` stays `Poisoned` and dropping the
                // guard poisons the gate.
                let value = init();

                // SAFETY: still exclusive; nobody reads `state` before `complete`.
                self.state
                    .with_mut(|state| unsafe { *state = LazyState::Computed(value) });
                guard.complete();
            }
        }

        // SAFETY: the gate is complete, so `state` is `Computed` and frozen.
        Ok(unsafe { self.computed_unchecked() })
    }

    /// Returns a mutable reference to the value, computing it if needed.
    ///
    /// `&mut self` proves exclusivity, so no other thread can be waiting.
    ///
    /// # Panics
    ///
    /// Panics if the box is poisoned.
    pub fn force_mut(&mut self) -> &mut T {
        self.force();
        match self.state.get_mut() {
            LazyState::Computed(value) => value,
            _ => unreachable!("LazyBox forced without a computed value"),
        }
    }

    /// Consumes the box, returning the value if it was computed, or the
    /// initializer if it never ran.
    ///
    /// # Panics
    ///
    /// Panics if the box is poisoned.
    pub fn into_inner(self) -> Result<T, F> {
        match self.state.into_inner() {
            LazyState::Computed(value) => Ok(value),
            LazyState::Pending(init) => Err(init),
            LazyState::Poisoned => panic!("{}", POISON_PANIC_MSG),
        }
    }
}

impl<T, F> LazyBox<T, F> {
    /// Returns the value if it has already been computed.
    ///
    /// Never runs the initializer and never blocks.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        if self.gate.is_complete() {
            // SAFETY: the gate is complete, so `state` is `Computed` and frozen.
            Some(unsafe { self.computed_unchecked() })
        } else {
            None
        }
    }

    /// Returns a mutable reference to the value if it has been computed.
    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self.state.get_mut() {
            LazyState::Computed(value) => Some(value),
            _ => None,
        }
    }

    /// Returns `true` once the value has been computed.
    #[inline]
    pub fn is_computed(&self) -> bool {
        self.gate.is_complete()
    }

    /// Returns `true` if the initializer panicked.
    #[inline]
    pub fn is_poisoned(&self) -> bool {
        self.gate.is_poisoned()
    }

    /// # Safety
    ///
    /// The gate must have been observed complete.
    #[inline]
    unsafe fn computed_unchecked(&self) -> &T {
        match self.state.with(|state| &*state) {
            LazyState::Computed(value) => value,
            _ => unreachable!("LazyBox gate complete without a computed value"),
        }
    }
}

impl<T, F: FnOnce() -> T> Deref for LazyBox<T, F> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        self.force()
    }
}

impl<T: Default> Default for LazyBox<T> {
    fn default() -> Self {
        Self::new(T::default)
    }
}

impl<T, F> From<T> for LazyBox<T, F> {
    /// Creates a box that is already computed.
    fn from(value: T) -> Self {
        Self {
            gate: Gate::new_complete(),
            state: UnsafeCell::new(LazyState::Computed(value)),
        }
    }
}

impl<T: fmt::Debug, F> fmt::Debug for LazyBox<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_tuple("LazyBox");
        match self.get() {
            Some(value) => d.field(value),
            None if self.is_poisoned() => d.field(&format_args!("<poisoned>")),
            None => d.field(&format_args!("<pending>")),
        };
        d.finish()
    }
}

/// Must fail to compile because sharing a box hands out `&T` to other threads.
/// ```compile_fail
/// use lazybox::LazyBox;
/// use std::cell::Cell;
///
/// fn require_sync<T: Sync>(_t: &T) {}
///
/// let x: LazyBox<Cell<u32>> = LazyBox::new(|| Cell::new(1));
/// require_sync(&x); // must fail to compile.
/// ```
///
/// Must fail to compile because the initializer may run on another thread.
/// ```compile_fail
/// use lazybox::LazyBox;
/// use std::rc::Rc;
///
/// fn require_sync<T: Sync>(_t: &T) {}
///
/// let rc = Rc::new(5);
/// let x = LazyBox::new(move || *rc);
/// require_sync(&x); // must fail to compile.
/// ```
struct _Unused; // Only exists to get the compile-fail doctest
