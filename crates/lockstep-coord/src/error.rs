//! Error types for the coordination primitives.

use lockstep_core::CoreError;
use lockstep_store::StoreError;
use thiserror::Error;

/// Errors raised by the coordination primitives.
#[derive(Debug, Error)]
pub enum CoordError {
    /// Remote store failure, propagated unmodified
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid primitive configuration
    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),

    /// Release of a lock this owner does not hold
    #[error("Lock {key}:{field} is not held by this owner")]
    NotLockOwner {
        /// Lock key
        key: String,
        /// Lock field
        field: String,
    },

    /// The renewal task could not be joined at release
    #[error("Renewal task for lock {key}:{field} panicked")]
    RenewalTask {
        /// Lock key
        key: String,
        /// Lock field
        field: String,
    },
}
