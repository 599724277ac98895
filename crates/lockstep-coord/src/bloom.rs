//! Distributed bloom filter over a shared remote bitmap.
//!
//! Same membership contract as the in-process filter in
//! `lockstep-core`: no false negatives, tunable false positives, no
//! removal. Every bit lives in the backing store under one logical key,
//! so separate processes pointed at the same store see one filter.
//!
//! Each `add` or `might_contain` costs one store round trip per
//! configured hasher. There is no client-side bit cache and no
//! cross-hasher atomicity: a concurrent reader may observe a
//! partially-written insert, which bloom-filter semantics tolerate.

use std::sync::Arc;

use lockstep_core::{BloomParams, standard_folders};
use lockstep_store::KvStore;
use tracing::trace;

use crate::{CoordError, DEFAULT_DISTRIBUTED_BLOOM_BITS};

/// Bloom filter whose bitmap is shared through the backing store.
pub struct DistributedBloomFilter {
    store: Arc<dyn KvStore>,
    key: String,
    params: BloomParams,
}

impl DistributedBloomFilter {
    /// Creates a filter over the bitmap at `key`.
    ///
    /// The parameters were validated at construction, so no call on the
    /// filter can observe an empty hasher list or an undersized bitmap.
    pub fn new(store: Arc<dyn KvStore>, key: impl Into<String>, params: BloomParams) -> Self {
        Self {
            store,
            key: key.into(),
            params,
        }
    }

    /// Ready-made configuration: the five standard digest folders over
    /// a bitmap of [`DEFAULT_DISTRIBUTED_BLOOM_BITS`].
    pub fn with_standard_folders(store: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        let params = BloomParams::new(DEFAULT_DISTRIBUTED_BLOOM_BITS, standard_folders())
            .expect("standard bloom parameters are valid");
        Self::new(store, key, params)
    }

    /// Marks an element present in the shared bitmap.
    ///
    /// One `set_bit` round trip per hasher. A failure propagates
    /// immediately and may leave a partial insert behind; the element
    /// simply stays unreported until a later `add` completes.
    pub async fn add(&self, element: &str) -> Result<(), CoordError> {
        for hasher in self.params.hashers() {
            let offset = self.params.offset(hasher.as_ref(), element);
            self.store.set_bit(&self.key, offset, true).await?;
            trace!(key = %self.key, algorithm = hasher.name(), offset, "Set filter bit");
        }
        Ok(())
    }

    /// Tests membership; `None` is never contained and costs no round
    /// trip.
    ///
    /// Queries one bit per hasher, short-circuiting on the first clear
    /// bit. A `true` answer may be a false positive; `false` is
    /// definitive.
    pub async fn might_contain(&self, element: Option<&str>) -> Result<bool, CoordError> {
        let Some(element) = element else {
            return Ok(false);
        };
        for hasher in self.params.hashers() {
            let offset = self.params.offset(hasher.as_ref(), element);
            if !self.store.get_bit(&self.key, offset).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Inverse of [`might_contain`](DistributedBloomFilter::might_contain).
    pub async fn not_contain(&self, element: Option<&str>) -> Result<bool, CoordError> {
        Ok(!self.might_contain(element).await?)
    }

    /// The backing-store key addressing the bitmap.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Filter parameters.
    pub fn params(&self) -> &BloomParams {
        &self.params
    }
}
