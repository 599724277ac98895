//! Store client errors.

use thiserror::Error;

/// Errors surfaced by a [`KvStore`](crate::KvStore) implementation.
///
/// Remote failures propagate immediately from the operation that
/// triggered them; the toolkit never retries internally.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not reach the store
    #[error("Store connection failed: {0}")]
    Connection(String),

    /// Remote call exceeded its deadline
    #[error("Store call timed out")]
    Timeout,

    /// Key exists with an incompatible type, or the store replied with
    /// something unexpected
    #[error("Store protocol error: {0}")]
    Protocol(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}
