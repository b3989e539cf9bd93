//! Thread-safe lazy initialization.

mod error;
pub mod lazy_box;

pub use error::PoisonError;
pub use lazy_box::LazyBox;
