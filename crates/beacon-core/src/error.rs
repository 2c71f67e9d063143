//! Configuration errors.
//!
//! Every variant is raised before any worker starts, so none of them is
//! retryable: fix the configuration and restart.

use thiserror::Error;

/// Errors from validating a [`ChainConfig`](crate::ChainConfig).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Rotation period is zero
    #[error("rotation period must be non-zero")]
    ZeroPeriod,

    /// Disclosure window is zero
    #[error("disclosure window must be non-zero")]
    EmptyWindow,

    /// Duration carries sub-millisecond precision that timestamps cannot
    /// represent
    #[error("{field} must be a whole number of milliseconds")]
    SubMillisecond {
        /// Which configuration field was rejected
        field: &'static str,
    },

    /// Duration does not fit a millisecond `u64`
    #[error("{field} is too large")]
    Overflow {
        /// Which configuration field was rejected
        field: &'static str,
    },

    /// Disclosure window is not a whole number of rotation periods
    #[error("disclosure window {window_ms}ms is not a multiple of rotation period {period_ms}ms")]
    WindowNotMultiple {
        /// Disclosure window in milliseconds
        window_ms: u64,
        /// Rotation period in milliseconds
        period_ms: u64,
    },
}
