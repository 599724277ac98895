//! Reentrant distributed lock with background lease renewal.
//!
//! Locks are addressed by (lock key, lock field) in the backing store
//! and owned by an explicit [`OwnerToken`] rather than a thread
//! identity, so the same primitive works across async tasks and
//! runtimes. The first acquisition by an owner spawns a renewal task
//! that re-asserts the lease at a fraction of the TTL via the store's
//! atomic check-and-renew operation; nested acquisitions only bump a
//! counter. Renewal failures surface on the lease-event channel instead
//! of being swallowed.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lockstep_core::Timestamp;
use lockstep_store::{KvStore, StoreError};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::{CoordError, DEFAULT_LOCK_TTL, LEASE_EVENT_CHANNEL_SIZE, RENEW_INTERVAL_DIVISOR};

/// Floor for the renewal interval, keeping pathological TTLs from
/// producing a zero-duration ticker.
const MIN_RENEW_INTERVAL: Duration = Duration::from_millis(1);

/// Caller-supplied lock owner identity.
///
/// Two acquisitions with the same token are reentrant; distinct tokens
/// contend. Generate one token per logical task or request and do not
/// share it across concurrent callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerToken(String);

impl OwnerToken {
    /// Wraps an existing identifier, such as a request or task id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random token.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The token string stored in the lock field.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lock manager configuration.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Lease TTL used by [`LockManager::try_acquire`].
    pub default_ttl: Duration,
    /// Renewal interval; must stay below the TTL. `None` derives
    /// `ttl / 3` per lock.
    pub renew_interval: Option<Duration>,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_LOCK_TTL,
            renew_interval: None,
        }
    }
}

/// Reason a held lease stopped renewing.
#[derive(Debug)]
pub enum LeaseLossReason {
    /// The store no longer names this owner: the lease expired and was
    /// taken over, or the field was deleted externally
    Overtaken,
    /// The renewal call failed against the store
    Store(StoreError),
}

/// Emitted when a held lock's renewal stops succeeding.
///
/// Without this signal a lapsed lease would only be discovered via a
/// failed release; hosts should watch the channel and abandon the
/// guarded work when their lease lapses.
#[derive(Debug)]
pub struct LeaseEvent {
    /// Lock key
    pub key: String,
    /// Lock field
    pub field: String,
    /// Owner whose lease lapsed
    pub owner: OwnerToken,
    /// Why renewal stopped
    pub reason: LeaseLossReason,
    /// When the loss was observed
    pub at: Timestamp,
}

/// Handle to a running renewal task.
struct RenewalTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Bookkeeping for one held lock.
///
/// Exclusively owned by the acquiring logical task; the manager only
/// keeps it to drive reentrancy counting and the renewal task.
struct LockFrame {
    created_at: Timestamp,
    ttl: Duration,
    reentrant_count: u32,
    /// Set by the renewal task when the lease lapses; checked on
    /// reentrant acquisition so a dead frame is not handed out again.
    lease_lost: Arc<AtomicBool>,
    renewal: Option<RenewalTask>,
}

type FrameKey = (String, String, String);

fn frame_key(key: &str, field: &str, owner: &OwnerToken) -> FrameKey {
    (key.to_string(), field.to_string(), owner.as_str().to_string())
}

/// Manager for reentrant distributed locks.
///
/// State machine per (key, field): Unlocked moves to Held(1) on a
/// successful atomic field acquire, Held(N) to Held(N+1) when the same
/// owner re-acquires, back down on release, and the renewal task exists
/// exactly while the count is above zero. Acquisition by a different
/// owner while held simply reports the lock as taken; blocking and
/// backoff are caller policy.
///
/// Dropping the manager drops every frame's shutdown channel, which
/// stops the renewal tasks on their next poll.
pub struct LockManager {
    store: Arc<dyn KvStore>,
    config: LockConfig,
    frames: Mutex<HashMap<FrameKey, LockFrame>>,
    lease_events: Option<mpsc::Sender<LeaseEvent>>,
}

impl LockManager {
    /// Creates a manager without a lease-event channel; lease losses
    /// are still logged at `warn` level.
    pub fn new(store: Arc<dyn KvStore>, config: LockConfig) -> Self {
        Self {
            store,
            config,
            frames: Mutex::new(HashMap::new()),
            lease_events: None,
        }
    }

    /// Creates a manager plus the receiving end of its lease-event
    /// channel.
    pub fn with_lease_events(
        store: Arc<dyn KvStore>,
        config: LockConfig,
    ) -> (Self, mpsc::Receiver<LeaseEvent>) {
        let (tx, rx) = mpsc::channel(LEASE_EVENT_CHANNEL_SIZE);
        let mut manager = Self::new(store, config);
        manager.lease_events = Some(tx);
        (manager, rx)
    }

    /// Attempts to acquire the lock with the configured default TTL.
    pub async fn try_acquire(
        &self,
        key: &str,
        field: &str,
        owner: &OwnerToken,
    ) -> Result<bool, CoordError> {
        self.try_acquire_with_ttl(key, field, owner, self.config.default_ttl)
            .await
    }

    /// Attempts to acquire the lock, holding the lease for `ttl`.
    ///
    /// Returns `Ok(true)` when this owner now holds the lock - either a
    /// fresh acquisition (one atomic set-if-absent on the field, plus a
    /// spawned renewal task) or a reentrant one (a counter bump, no
    /// store round trip, no second renewal task). Returns `Ok(false)`
    /// when another owner holds the lock, or when this owner's previous
    /// lease lapsed and the holder has yet to release its dead frame.
    pub async fn try_acquire_with_ttl(
        &self,
        key: &str,
        field: &str,
        owner: &OwnerToken,
        ttl: Duration,
    ) -> Result<bool, CoordError> {
        let frame_key = frame_key(key, field, owner);

        {
            let mut frames = self.frames.lock();
            if let Some(frame) = frames.get_mut(&frame_key) {
                if frame.lease_lost.load(Ordering::Acquire) {
                    warn!(
                        key,
                        field,
                        owner = %owner,
                        "Refusing reentrant acquisition on a lapsed lease; release and re-acquire"
                    );
                    return Ok(false);
                }
                frame.reentrant_count += 1;
                debug!(
                    key,
                    field,
                    owner = %owner,
                    count = frame.reentrant_count,
                    "Reentrant lock acquisition"
                );
                return Ok(true);
            }
        }

        let acquired = self
            .store
            .acquire_field(key, field, owner.as_str(), ttl)
            .await?;
        if !acquired {
            debug!(key, field, owner = %owner, "Lock held by another owner");
            return Ok(false);
        }

        let lease_lost = Arc::new(AtomicBool::new(false));
        let renewal = self.spawn_renewal(key, field, owner, ttl, lease_lost.clone());
        let frame = LockFrame {
            created_at: Timestamp::now(),
            ttl,
            reentrant_count: 1,
            lease_lost,
            renewal: Some(renewal),
        };
        self.frames.lock().insert(frame_key, frame);

        debug!(
            key,
            field,
            owner = %owner,
            ttl_ms = ttl.as_millis() as u64,
            "Acquired lock"
        );
        Ok(true)
    }

    /// Releases one hold on the lock.
    ///
    /// Returns `Ok(false)` while nested holds remain. On the final
    /// hold it stops the renewal task, waits for it to finish - the
    /// cancellation happens before the field is touched, so a stale
    /// renewal can never race a later acquisition by another owner -
    /// and then deletes the field under the owner guard. Returns
    /// `Ok(true)` once the lock is fully released.
    ///
    /// Releasing a lock this owner does not hold is
    /// [`CoordError::NotLockOwner`].
    pub async fn release(
        &self,
        key: &str,
        field: &str,
        owner: &OwnerToken,
    ) -> Result<bool, CoordError> {
        let frame_key = frame_key(key, field, owner);

        let (renewal, ttl, created_at) = {
            let mut frames = self.frames.lock();
            let frame = frames
                .get_mut(&frame_key)
                .ok_or_else(|| CoordError::NotLockOwner {
                    key: key.to_string(),
                    field: field.to_string(),
                })?;
            frame.reentrant_count -= 1;
            if frame.reentrant_count > 0 {
                debug!(
                    key,
                    field,
                    owner = %owner,
                    count = frame.reentrant_count,
                    "Released nested lock hold"
                );
                return Ok(false);
            }
            let mut frame = frames
                .remove(&frame_key)
                .ok_or_else(|| CoordError::NotLockOwner {
                    key: key.to_string(),
                    field: field.to_string(),
                })?;
            (frame.renewal.take(), frame.ttl, frame.created_at)
        };

        if let Some(renewal) = renewal {
            let _ = renewal.shutdown.send(());
            renewal
                .handle
                .await
                .map_err(|_| CoordError::RenewalTask {
                    key: key.to_string(),
                    field: field.to_string(),
                })?;
        }

        let deleted = self
            .store
            .delete_field_if_owner(key, field, owner.as_str())
            .await?;
        if !deleted {
            warn!(
                key,
                field,
                owner = %owner,
                "Lock field already gone at release; the lease had lapsed"
            );
        }
        debug!(
            key,
            field,
            owner = %owner,
            ttl_ms = ttl.as_millis() as u64,
            held_ms = Timestamp::now()
                .duration_since(&created_at)
                .unwrap_or_default()
                .as_millis() as u64,
            "Released lock"
        );
        Ok(true)
    }

    /// Reentrant hold count of a lock, `None` when this owner holds no
    /// frame for it.
    pub fn reentrant_count(&self, key: &str, field: &str, owner: &OwnerToken) -> Option<u32> {
        self.frames
            .lock()
            .get(&frame_key(key, field, owner))
            .map(|frame| frame.reentrant_count)
    }

    /// How long a lock has been held by this owner, `None` when not
    /// held.
    pub fn held_since(&self, key: &str, field: &str, owner: &OwnerToken) -> Option<Timestamp> {
        self.frames
            .lock()
            .get(&frame_key(key, field, owner))
            .map(|frame| frame.created_at)
    }

    /// Number of locks currently held through this manager.
    pub fn held_lock_count(&self) -> usize {
        self.frames.lock().len()
    }

    fn spawn_renewal(
        &self,
        key: &str,
        field: &str,
        owner: &OwnerToken,
        ttl: Duration,
        lease_lost: Arc<AtomicBool>,
    ) -> RenewalTask {
        let interval = self
            .config
            .renew_interval
            .unwrap_or(ttl / RENEW_INTERVAL_DIVISOR)
            .max(MIN_RENEW_INTERVAL);

        let store = self.store.clone();
        let events = self.lease_events.clone();
        let key = key.to_string();
        let field = field.to_string();
        let owner = owner.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; consume it so renewal
            // starts one interval after acquisition.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        trace!(key = %key, field = %field, "Renewal task stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match store.renew_if_owner(&key, &field, owner.as_str(), ttl).await {
                            Ok(true) => {
                                trace!(key = %key, field = %field, "Renewed lock lease");
                            }
                            Ok(false) => {
                                lease_lost.store(true, Ordering::Release);
                                report_lease_loss(
                                    &events,
                                    &key,
                                    &field,
                                    &owner,
                                    LeaseLossReason::Overtaken,
                                );
                                break;
                            }
                            Err(err) => {
                                lease_lost.store(true, Ordering::Release);
                                report_lease_loss(
                                    &events,
                                    &key,
                                    &field,
                                    &owner,
                                    LeaseLossReason::Store(err),
                                );
                                break;
                            }
                        }
                    }
                }
            }
        });

        RenewalTask {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

/// Logs a lease loss and forwards it on the event channel when one is
/// wired. The renewal task stops after reporting; the toolkit performs
/// no internal retries, so the host decides whether to release and
/// re-acquire.
fn report_lease_loss(
    events: &Option<mpsc::Sender<LeaseEvent>>,
    key: &str,
    field: &str,
    owner: &OwnerToken,
    reason: LeaseLossReason,
) {
    warn!(key, field, owner = %owner, reason = ?reason, "Lock lease lost");
    if let Some(tx) = events {
        let event = LeaseEvent {
            key: key.to_string(),
            field: field.to_string(),
            owner: owner.clone(),
            reason,
            at: Timestamp::now(),
        };
        if tx.try_send(event).is_err() {
            warn!(key, field, "Lease-event channel full or closed; event dropped");
        }
    }
}
