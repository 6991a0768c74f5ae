//! Error types.
//!
//! Staleness is never an error: reading a node always brings it up to date.
//! What remains is configuration that cannot work and runaway flushes.

use thiserror::Error;

/// Errors raised while validating a [`RuntimeConfig`](crate::RuntimeConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A flush limit of zero would refuse to run any effect.
    #[error("flush limit must be greater than zero")]
    ZeroFlushLimit,
}

/// Errors raised by the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// The runtime configuration was rejected.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] ConfigError),

    /// A single flush ran more effects than the configured limit, which
    /// usually means effects keep re-triggering each other.
    #[error("flush exceeded the limit of {limit} effect runs")]
    FlushLimitExceeded {
        /// The configured limit
        limit: usize,
    },
}
