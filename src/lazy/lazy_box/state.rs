use core::mem;

/// What a `LazyBox` currently owns.
///
/// Moves out of `Pending` exactly once: to `Computed` when the initializer
/// returns, or to `Poisoned` when it unwinds.
pub(super) enum LazyState<T, F> {
    Pending(F),
    Computed(T),
    Poisoned,
}

impl<T, F> LazyState<T, F> {
    /// Takes the initializer out, leaving `Poisoned` behind until the caller
    /// stores the computed value.
    ///
    /// Returns `None` and leaves the state untouched if nothing is pending.
    pub(super) fn take_pending(&mut self) -> Option<F> {
        match mem::replace(self, LazyState::Poisoned) {
            LazyState::Pending(init) => Some(init),
            settled => {
                *self = settled;
                None
            }
        }
    }
}
