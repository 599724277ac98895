//! Abstract key-value store client.
//!
//! The coordination primitives consume a deliberately small store
//! surface: bitmap bit get/set for the distributed bloom filter,
//! set-if-absent-with-expiry for the dedup guard, and three atomic
//! field operations backing the distributed lock. Real deployments map
//! each operation onto one store round trip or server-side script;
//! [`MemoryStore`](crate::MemoryStore) is the in-process variant.

use std::time::Duration;

use async_trait::async_trait;

use crate::StoreError;

/// Client for the external key-value store acting as the source of
/// truth for all distributed state.
///
/// Every operation may block for a network round trip; callers apply
/// their own deadlines and cancellation. Implementations must execute
/// each operation atomically on the store side - in particular the
/// field operations, whose check-and-act semantics are what makes the
/// lock correct. Nothing here retries; a failed call surfaces
/// immediately as a [`StoreError`].
///
/// Key naming is entirely caller-defined.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reads one bit of the bitmap at `key`.
    ///
    /// A missing key reads as all-zero.
    async fn get_bit(&self, key: &str, offset: u64) -> Result<bool, StoreError>;

    /// Sets one bit of the bitmap at `key`, returning the previous bit.
    async fn set_bit(&self, key: &str, offset: u64, value: bool) -> Result<bool, StoreError>;

    /// Sets `key` to `value` with expiry `ttl`, only if the key is
    /// absent.
    ///
    /// Returns true iff this call created the key.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Sets the hash field `field` of `key` to `owner` only if the
    /// field is absent, and applies `ttl` to the key.
    ///
    /// Returns true iff the field was set; an existing field - whatever
    /// its value - leaves the store untouched.
    async fn acquire_field(
        &self,
        key: &str,
        field: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Extends the expiry of `key` by `ttl` only while `field` still
    /// holds `owner`.
    ///
    /// Returns false, changing nothing, when the field is gone or names
    /// a different owner. A renewal denied this way is not an error.
    async fn renew_if_owner(
        &self,
        key: &str,
        field: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Deletes `field` from `key` only while it still holds `owner`.
    ///
    /// Returns true iff the field was removed.
    async fn delete_field_if_owner(
        &self,
        key: &str,
        field: &str,
        owner: &str,
    ) -> Result<bool, StoreError>;
}
