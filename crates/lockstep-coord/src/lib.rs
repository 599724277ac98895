//! Lockstep Coord - distributed coordination primitives over an
//! abstract key-value store.
//!
//! This crate provides:
//! - [`DistributedBloomFilter`]: membership testing over a bitmap
//!   shared across processes
//! - [`LockManager`]: reentrant distributed locks kept alive by
//!   background lease renewal
//! - [`DedupGuard`]: at-most-once-within-window admission for logical
//!   operations
//!
//! All three trust the store behind
//! [`KvStore`](lockstep_store::KvStore) as the single source of truth;
//! none of them retries a failed remote call.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

use std::time::Duration;

pub mod bloom;
pub mod dedup;
pub mod error;
pub mod lock;

pub use bloom::DistributedBloomFilter;
pub use dedup::DedupGuard;
pub use error::CoordError;
pub use lock::{LeaseEvent, LeaseLossReason, LockConfig, LockManager, OwnerToken};

/// Default bitmap size for the distributed bloom filter: one billion
/// bits.
pub const DEFAULT_DISTRIBUTED_BLOOM_BITS: u64 = 1_000_000_000;

/// Default lock lease TTL.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Divisor applied to a lock's TTL to derive its renewal interval when
/// none is configured: leases renew every `ttl / 3`.
pub const RENEW_INTERVAL_DIVISOR: u32 = 3;

/// Buffer size of the lease-event channel.
pub const LEASE_EVENT_CHANNEL_SIZE: usize = 64;
