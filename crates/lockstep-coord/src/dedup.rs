//! Single-shot call de-duplication.
//!
//! Guards a logical operation so that at most one caller per key
//! proceeds within a lease window. One atomic set-if-absent round trip
//! decides the winner; the key then expires on its own. There is no
//! renewal and no reentrancy.

use std::sync::Arc;
use std::time::Duration;

use lockstep_store::KvStore;
use tracing::debug;

use crate::CoordError;

/// Sentinel stored under a dedup key; only its presence matters.
const DEDUP_SENTINEL: &str = "1";

/// At-most-once-within-window admission guard.
pub struct DedupGuard {
    store: Arc<dyn KvStore>,
}

impl DedupGuard {
    /// Creates a guard over the given store.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Attempts to claim `dedup_key` for the `lease` window.
    ///
    /// Returns `Ok(true)` iff this call won the race to create the key;
    /// the caller then proceeds with the guarded operation. `Ok(false)`
    /// means another call already claimed the key inside the window -
    /// that is not an error here; whether to raise or silently skip is
    /// the caller's policy.
    pub async fn try_enter(&self, dedup_key: &str, lease: Duration) -> Result<bool, CoordError> {
        let admitted = self
            .store
            .set_if_absent(dedup_key, DEDUP_SENTINEL, lease)
            .await?;
        debug!(
            key = dedup_key,
            admitted,
            lease_ms = lease.as_millis() as u64,
            "Dedup admission check"
        );
        Ok(admitted)
    }
}
