use core::fmt;

/// Panic message raised when a poisoned [`LazyBox`](crate::LazyBox) is read.
pub(crate) const POISON_PANIC_MSG: &str = "LazyBox instance has been poisoned";

/// Returned by [`LazyBox::try_force`](crate::LazyBox::try_force) when an
/// earlier initializer panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoisonError;

impl fmt::Display for PoisonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(POISON_PANIC_MSG)
    }
}

impl std::error::Error for PoisonError {}
