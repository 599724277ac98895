//! In-process bloom filter.
//!
//! Probabilistic set membership over a fixed-size bit array: no false
//! negatives for added elements, tunable false-positive rate, no
//! removal. The distributed variant in `lockstep-coord` shares the
//! parameter and indexing logic defined here.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::CoreError;
use crate::hash::HashFn;
use crate::MIN_BLOOM_BITS;

/// Validated configuration shared by the local and distributed bloom
/// filters.
#[derive(Clone)]
pub struct BloomParams {
    bits: u64,
    hashers: Vec<Arc<dyn HashFn>>,
}

impl BloomParams {
    /// Validates and builds filter parameters.
    ///
    /// Fails fast with [`CoreError::NoHashFunctions`] on an empty hasher
    /// list and [`CoreError::BitmapTooSmall`] below [`MIN_BLOOM_BITS`],
    /// so no filter call can ever observe a bad configuration.
    /// Production filters should size the bitmap at
    /// [`RECOMMENDED_BLOOM_BITS`](crate::RECOMMENDED_BLOOM_BITS) or
    /// above.
    pub fn new(bits: u64, hashers: Vec<Arc<dyn HashFn>>) -> Result<Self, CoreError> {
        if hashers.is_empty() {
            return Err(CoreError::NoHashFunctions);
        }
        if bits < MIN_BLOOM_BITS {
            return Err(CoreError::BitmapTooSmall {
                bits,
                min: MIN_BLOOM_BITS,
            });
        }
        Ok(Self { bits, hashers })
    }
}

impl fmt::Debug for BloomParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloomParams")
            .field("bits", &self.bits)
            .field("hashers", &self.hashers.len())
            .finish()
    }
}

impl BloomParams {

    /// Bitmap size in bits.
    pub fn bits(&self) -> u64 {
        self.bits
    }

    /// Configured hash functions, in application order.
    pub fn hashers(&self) -> &[Arc<dyn HashFn>] {
        &self.hashers
    }

    /// Bit offset of an element under one hasher.
    ///
    /// `unsigned_abs` folds the signed hash into the non-negative range
    /// without overflowing on `i32::MIN`.
    pub fn offset(&self, hasher: &dyn HashFn, element: &str) -> u64 {
        u64::from(hasher.fold(element).unsigned_abs()) % self.bits
    }

    /// Bit offsets of an element under every configured hasher.
    pub fn offsets<'a>(&'a self, element: &'a str) -> impl Iterator<Item = u64> + 'a {
        self.hashers
            .iter()
            .map(move |hasher| self.offset(hasher.as_ref(), element))
    }
}

/// In-process bloom filter over a fixed-size bit array.
///
/// Never returns a false negative for an added element; false positives
/// occur at a rate governed by bitmap size, hasher count, and insert
/// volume. The bit array sits behind an `RwLock` so `add` and
/// `might_contain` take `&self` and are safe to call concurrently.
pub struct BloomFilter {
    params: BloomParams,
    words: RwLock<Vec<u64>>,
}

impl BloomFilter {
    /// Creates an empty filter.
    pub fn new(params: BloomParams) -> Self {
        let word_count = params.bits().div_ceil(64) as usize;
        Self {
            params,
            words: RwLock::new(vec![0u64; word_count]),
        }
    }

    /// Marks an element present by setting one bit per hasher.
    pub fn add(&self, element: &str) {
        let mut words = self.words.write();
        for offset in self.params.offsets(element) {
            words[(offset / 64) as usize] |= 1u64 << (offset % 64);
        }
    }

    /// Tests membership; `None` is never contained.
    ///
    /// A `true` answer may be a false positive; `false` is definitive.
    pub fn might_contain(&self, element: Option<&str>) -> bool {
        let Some(element) = element else {
            return false;
        };
        let words = self.words.read();
        self.params
            .offsets(element)
            .all(|offset| words[(offset / 64) as usize] & (1u64 << (offset % 64)) != 0)
    }

    /// Inverse of [`might_contain`](BloomFilter::might_contain).
    pub fn not_contain(&self, element: Option<&str>) -> bool {
        !self.might_contain(element)
    }

    /// Number of set bits, for observability.
    pub fn bit_count(&self) -> u64 {
        self.words
            .read()
            .iter()
            .map(|word| u64::from(word.count_ones()))
            .sum()
    }

    /// Filter parameters.
    pub fn params(&self) -> &BloomParams {
        &self.params
    }
}
