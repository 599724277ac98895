//! Shared-store harness for multi-"process" integration tests.

use std::sync::Arc;

use lockstep_coord::{
    DedupGuard, DistributedBloomFilter, LeaseEvent, LockConfig, LockManager,
};
use lockstep_core::{BloomParams, standard_folders};
use lockstep_store::MemoryStore;
use tokio::sync::mpsc;

/// Bitmap size used by harness-built filters; small enough to keep
/// tests fast, large enough to keep false positives negligible.
pub const TEST_BLOOM_BITS: u64 = 1_000_000;

/// A set of coordination clients sharing one backing store.
///
/// Each client built here stands in for a separate process pointed at
/// the same store, which is exactly the topology the distributed
/// primitives assume.
pub struct TestCluster {
    store: Arc<MemoryStore>,
}

impl TestCluster {
    /// Creates a cluster around a fresh in-memory store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// The shared backing store, for direct state assertions.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// A lock manager with default configuration.
    pub fn lock_manager(&self) -> LockManager {
        LockManager::new(self.store.clone(), LockConfig::default())
    }

    /// A lock manager with explicit configuration.
    pub fn lock_manager_with_config(&self, config: LockConfig) -> LockManager {
        LockManager::new(self.store.clone(), config)
    }

    /// A lock manager wired to a lease-event channel.
    pub fn lock_manager_with_events(
        &self,
        config: LockConfig,
    ) -> (LockManager, mpsc::Receiver<LeaseEvent>) {
        LockManager::with_lease_events(self.store.clone(), config)
    }

    /// A distributed bloom filter over `key`, five standard folders,
    /// [`TEST_BLOOM_BITS`] bits.
    pub fn bloom_filter(&self, key: &str) -> DistributedBloomFilter {
        let params = BloomParams::new(TEST_BLOOM_BITS, standard_folders())
            .expect("harness bloom parameters are valid");
        DistributedBloomFilter::new(self.store.clone(), key, params)
    }

    /// A dedup guard over the shared store.
    pub fn dedup_guard(&self) -> DedupGuard {
        DedupGuard::new(self.store.clone())
    }
}

impl Default for TestCluster {
    fn default() -> Self {
        Self::new()
    }
}
