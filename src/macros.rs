/// Emits a `tracing::trace!` event when the `tracing` feature is enabled.
///
/// Expands to nothing otherwise, so the hot paths carry no logging cost in
/// default builds.
macro_rules! trace_event {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        {
            tracing::trace!($($arg)*);
        }
    };
}

/// Emits a `tracing::warn!` event when the `tracing` feature is enabled.
macro_rules! warn_event {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        {
            tracing::warn!($($arg)*);
        }
    };
}
