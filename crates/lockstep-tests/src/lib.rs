//! Integration tests for the lockstep toolkit.
//!
//! This crate provides:
//! - A harness sharing one in-memory store across logical "processes"
//! - Integration suites for locks, filters, and the dedup guard

pub mod harness;

pub use harness::TestCluster;
