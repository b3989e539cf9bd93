//! `Gate` - a one-shot atomic state machine that elects a single initializer.
//!
//! The first thread to move the gate out of `INCOMPLETE` becomes the winner and
//! holds a [`Guard`]. Everyone else spins briefly, then parks on the state word
//! until the guard is released as `COMPLETE` or, if the winner unwinds, as
//! `POISONED`.

use crossbeam_utils::Backoff;

use super::{wait_on_u32, wake_all_u32, AtomicU32, Ordering};

const INCOMPLETE: u32 = 0;
const RUNNING: u32 = 1;
const CONTENDED: u32 = 2;
const COMPLETE: u32 = 3;
const POISONED: u32 = 4;

/// Serializes a one-time initialization.
///
/// Writes made by the winner before [`Guard::complete`] are visible to every
/// thread that later observes [`Entry::Complete`].
pub(crate) struct Gate {
    /// 0: incomplete, 1: running, 2: running & contended, 3: complete, 4: poisoned
    state: AtomicU32,
}

/// Outcome of [`Gate::enter`].
pub(crate) enum Entry<'a> {
    /// The caller won and must run the initialization.
    Winner(Guard<'a>),
    /// Initialization already finished.
    Complete,
    /// A previous initialization panicked.
    Poisoned,
}

impl Gate {
    /// Creates a gate that has not run yet.
    #[cfg(not(loom))]
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU32::new(INCOMPLETE),
        }
    }

    /// Creates a gate whose initialization is already done.
    #[cfg(not(loom))]
    pub(crate) const fn new_complete() -> Self {
        Self {
            state: AtomicU32::new(COMPLETE),
        }
    }

    #[cfg(loom)]
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU32::new(INCOMPLETE),
        }
    }

    #[cfg(loom)]
    pub(crate) fn new_complete() -> Self {
        Self {
            state: AtomicU32::new(COMPLETE),
        }
    }

    #[inline]
    pub(crate) fn is_complete(&self) -> bool {
        self.state.load(Ordering::Acquire) == COMPLETE
    }

    #[inline]
    pub(crate) fn is_poisoned(&self) -> bool {
        self.state.load(Ordering::Acquire) == POISONED
    }

    /// Blocks until the caller either wins the right to initialize or the
    /// initialization has finished (successfully or not).
    ///
    /// # Panics
    ///
    /// Panics if the calling thread is the one currently running this gate's
    /// initialization.
    #[inline]
    pub(crate) fn enter(&self) -> Entry<'_> {
        let state = self.state.load(Ordering::Acquire);
        if state == COMPLETE {
            return Entry::Complete;
        }
        self.enter_slow(state)
    }

    #[cold]
    fn enter_slow(&self, mut state: u32) -> Entry<'_> {
        let backoff = Backoff::new();
        loop {
            match state {
                COMPLETE => return Entry::Complete,
                POISONED => return Entry::Poisoned,
                INCOMPLETE => {
                    match self.state.compare_exchange_weak(
                        INCOMPLETE,
                        RUNNING,
                        Ordering::Acquire,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            reentrancy::enter(self);
                            trace_event!(gate = ?(self as *const Self), "won initialization race");
                            return Entry::Winner(Guard {
                                gate: self,
                                terminal: POISONED,
                            });
                        }
                        Err(s) => state = s,
                    }
                }
                _ => {
                    reentrancy::assert_not_running(self);

                    // Short initializations finish before a park is worth it.
                    if cfg!(not(loom)) && state == RUNNING && !backoff.is_completed() {
                        backoff.snooze();
                        state = self.state.load(Ordering::Acquire);
                        continue;
                    }

                    if state == RUNNING {
                        if let Err(s) = self.state.compare_exchange_weak(
                            RUNNING,
                            CONTENDED,
                            Ordering::Acquire,
                            Ordering::Acquire,
                        ) {
                            state = s;
                            continue;
                        }
                    }

                    trace_event!(gate = ?(self as *const Self), "parking until initialization finishes");
                    wait_on_u32(&self.state, CONTENDED);
                    state = self.state.load(Ordering::Acquire);
                }
            }
        }
    }
}

/// Held by the winning thread while it initializes.
///
/// Dropping the guard without calling [`complete`](Guard::complete) poisons
/// the gate; this is what happens when the initializer unwinds.
pub(crate) struct Guard<'a> {
    gate: &'a Gate,
    terminal: u32,
}

impl Guard<'_> {
    /// Publishes the initialization and releases every waiter.
    #[inline]
    pub(crate) fn complete(mut self) {
        self.terminal = COMPLETE;
    }
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        reentrancy::exit(self.gate);
        if self.terminal == POISONED {
            warn_event!(gate = ?(self.gate as *const Gate), "initializer panicked, poisoning");
        } else {
            trace_event!(gate = ?(self.gate as *const Gate), "initialization complete");
        }
        if self.gate.state.swap(self.terminal, Ordering::Release) == CONTENDED {
            wake_all_u32(&self.gate.state);
        }
    }
}

/// Per-thread record of the gates whose initializer is running on this thread.
#[cfg(not(loom))]
mod reentrancy {
    use super::Gate;
    use std::cell::RefCell;

    thread_local! {
        static RUNNING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
    }

    fn key(gate: &Gate) -> usize {
        gate as *const Gate as usize
    }

    pub(super) fn enter(gate: &Gate) {
        let key = key(gate);
        let _ = RUNNING.try_with(|running| running.borrow_mut().push(key));
    }

    pub(super) fn exit(gate: &Gate) {
        let key = key(gate);
        let _ = RUNNING.try_with(|running| {
            let mut running = running.borrow_mut();
            if let Some(pos) = running.iter().rposition(|&k| k == key) {
                running.remove(pos);
            }
        });
    }

    pub(super) fn assert_not_running(gate: &Gate) {
        let key = key(gate);
        let reentrant = RUNNING
            .try_with(|running| running.borrow().contains(&key))
            .unwrap_or(false);
        if reentrant {
            panic!("reentrant initialization of LazyBox");
        }
    }
}

// Loom runs every model thread on one OS thread, so thread-locals would alias.
#[cfg(loom)]
mod reentrancy {
    use super::Gate;

    pub(super) fn enter(_gate: &Gate) {}

    pub(super) fn exit(_gate: &Gate) {}

    pub(super) fn assert_not_running(_gate: &Gate) {}
}
