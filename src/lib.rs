//! # `lazybox` - Thread-Safe Lazy Values
//!
//! A [`LazyBox`] defers computing its contents until the first read, runs the
//! computation at most once no matter how many threads race to read it, and
//! caches the result for every later read.
//!
//! ## Guarantees
//!
//! ### Single computation
//! - **Exactly one winner**: the first thread to reach the box runs the
//!   initializer. Threads arriving while it runs block, then observe the same
//!   value. The initializer is never invoked twice.
//! - **Deferred execution**: constructing a box never calls the initializer.
//! - **Publication**: the computed value is published with release/acquire
//!   ordering, so every reader sees a fully constructed value.
//!
//! ### Failure
//! - **Poisoning**: if the initializer panics, the panic unwinds through the
//!   thread that ran it and the box is poisoned. Waiting and later readers
//!   panic too, or get a [`PoisonError`] from [`LazyBox::try_force`].
//! - **Re-entrancy**: reading a box from inside its own initializer panics
//!   instead of deadlocking.
//!
//! ## Architecture
//!
//! 1. **Wait/wake** (`sync`): parks threads on an `AtomicU32` using futexes on
//!    Linux and `WaitOnAddress` on Windows.
//! 2. **Gate** (`sync::gate`): a one-shot atomic state machine that elects the
//!    winner, parks late arrivals after a short `crossbeam_utils::Backoff`
//!    spin, and records poisoning.
//! 3. **Container** ([`lazy`]): holds either the pending initializer or the
//!    computed value behind the gate.
//!
//! ## Example
//!
//! ```rust
//! use lazybox::LazyBox;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use std::thread;
//!
//! struct Image {
//!     metadata: LazyBox<HashMap<String, String>>,
//! }
//!
//! let image = Arc::new(Image {
//!     metadata: LazyBox::new(|| {
//!         // Expensive: load the file and parse its metadata.
//!         HashMap::from([("format".to_string(), "png".to_string())])
//!     }),
//! });
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let image = Arc::clone(&image);
//!         thread::spawn(move || image.metadata["format"].clone())
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     assert_eq!(handle.join().unwrap(), "png");
//! }
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

#[macro_use]
mod macros;

pub mod lazy;
mod sync;

pub use lazy::{LazyBox, PoisonError};

// The box is one state word plus the payload.
#[cfg(not(loom))]
const _: () = {
    use core::mem;

    assert!(mem::size_of::<LazyBox<u64>>() <= mem::size_of::<u64>() * 4);
};
