//! Error types for the core primitives.

use thiserror::Error;

/// Errors raised by the core primitives.
///
/// The configuration variants are raised at construction time and are
/// never retryable. `EmptyRing` is raised at lookup time and requires
/// the caller to add nodes first.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Digest algorithm name not recognized
    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Filter configured without hash functions
    #[error("At least one hash function is required")]
    NoHashFunctions,

    /// Bitmap smaller than the supported floor
    #[error("Bitmap of {bits} bits is below the minimum of {min}")]
    BitmapTooSmall {
        /// Requested bitmap size
        bits: u64,
        /// Smallest accepted size
        min: u64,
    },

    /// Ring configured with zero virtual nodes per physical node
    #[error("Virtual-node replicas must be at least 1")]
    InvalidReplicas,

    /// Lookup against a ring with no nodes
    #[error("Hash ring is empty; add nodes before looking up keys")]
    EmptyRing,
}
