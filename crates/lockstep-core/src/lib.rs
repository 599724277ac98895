//! Lockstep Core - hashing and membership primitives for the lockstep
//! coordination toolkit.
//!
//! This crate provides:
//! - Digest-based 32-bit hash folding (`HashFn`, `DigestFolder`)
//! - A consistent-hash ring with virtual nodes (`HashRing`)
//! - An in-process bloom filter (`BloomFilter`)
//! - Timestamp handling shared by the store and coordination crates
//!
//! Everything here is pure and synchronous; the distributed counterparts
//! live in `lockstep-coord`.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod bloom;
pub mod error;
pub mod hash;
pub mod ring;
pub mod time;

pub use bloom::{BloomFilter, BloomParams};
pub use error::CoreError;
pub use hash::{DigestAlgorithm, DigestFolder, HashFn, standard_folders};
pub use ring::HashRing;
pub use time::Timestamp;

/// Default number of virtual nodes per physical node on the hash ring.
pub const DEFAULT_VNODE_REPLICAS: usize = 100;

/// Smallest bitmap size a bloom filter will accept, in bits.
pub const MIN_BLOOM_BITS: u64 = 64;

/// Recommended minimum bitmap size for production bloom filters, in bits.
pub const RECOMMENDED_BLOOM_BITS: u64 = 10_000_000;
