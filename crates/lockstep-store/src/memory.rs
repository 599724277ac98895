//! In-process store implementation with real TTL semantics.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use lockstep_core::Timestamp;
use parking_lot::Mutex;
use tracing::debug;

use crate::{KvStore, StoreError};

/// Payload of a single key.
enum Value {
    /// Bitmap stored sparsely as word index -> 64-bit word
    Bitmap(HashMap<u64, u64>),
    /// Plain string value
    String(String),
    /// Hash of field -> value
    Fields(HashMap<String, String>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Bitmap(_) => "bitmap",
            Value::String(_) => "string",
            Value::Fields(_) => "hash",
        }
    }
}

struct Entry {
    value: Value,
    /// `None` means the key never expires.
    expires_at: Option<Timestamp>,
}

impl Entry {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| !at.is_after(&now))
    }
}

/// In-process [`KvStore`] backed by a mutex-guarded map.
///
/// Expired keys are dropped lazily when touched. The mutex is held
/// across each whole read-modify-write, giving every trait operation
/// the same atomicity a real store provides server-side. Suitable for
/// the integration harness and for single-process hosts; it is not a
/// distributed store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops `key` when its expiry has passed, then returns the live
    /// entry, if any.
    fn live_entry<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
    ) -> Option<&'a mut Entry> {
        let now = Timestamp::now();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    fn wrong_type(key: &str, value: &Value) -> StoreError {
        StoreError::Protocol(format!(
            "key {key} holds a {} value",
            value.type_name()
        ))
    }

    /// Returns true if `key` currently exists, expiry considered.
    pub fn key_exists(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        Self::live_entry(&mut entries, key).is_some()
    }

    /// Current value of a hash field, if the key is live and holds one.
    pub fn field_value(&self, key: &str, field: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        match Self::live_entry(&mut entries, key) {
            Some(Entry {
                value: Value::Fields(fields),
                ..
            }) => fields.get(field).cloned(),
            _ => None,
        }
    }

    /// Remaining time to live of `key`, `None` when absent or
    /// non-expiring.
    pub fn time_to_live(&self, key: &str) -> Option<Duration> {
        let mut entries = self.entries.lock();
        let entry = Self::live_entry(&mut entries, key)?;
        entry
            .expires_at
            .and_then(|at| at.duration_since(&Timestamp::now()))
    }

    /// Drops a key outright, regardless of contents or owner.
    ///
    /// Stands in for an external expiry or takeover when exercising
    /// lease-loss paths.
    pub fn drop_key(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get_bit(&self, key: &str, offset: u64) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        match Self::live_entry(&mut entries, key) {
            Some(Entry {
                value: Value::Bitmap(words),
                ..
            }) => {
                let word = words.get(&(offset / 64)).copied().unwrap_or(0);
                Ok(word & (1u64 << (offset % 64)) != 0)
            }
            Some(entry) => Err(Self::wrong_type(key, &entry.value)),
            None => Ok(false),
        }
    }

    async fn set_bit(&self, key: &str, offset: u64, value: bool) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        let now = Timestamp::now();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Bitmap(HashMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Bitmap(words) => {
                let word = words.entry(offset / 64).or_insert(0);
                let mask = 1u64 << (offset % 64);
                let previous = *word & mask != 0;
                if value {
                    *word |= mask;
                } else {
                    *word &= !mask;
                }
                Ok(previous)
            }
            other => Err(Self::wrong_type(key, other)),
        }
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        if Self::live_entry(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::String(value.to_string()),
                expires_at: Some(Timestamp::now().add(ttl)),
            },
        );
        Ok(true)
    }

    async fn acquire_field(
        &self,
        key: &str,
        field: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        let now = Timestamp::now();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        let expires_at = Some(now.add(ttl));
        match entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                match &mut entry.value {
                    Value::Fields(fields) => {
                        if fields.contains_key(field) {
                            return Ok(false);
                        }
                        fields.insert(field.to_string(), owner.to_string());
                        entry.expires_at = expires_at;
                        debug!(key, field, owner, "Acquired lock field");
                        Ok(true)
                    }
                    other => Err(Self::wrong_type(key, other)),
                }
            }
            MapEntry::Vacant(vacant) => {
                let mut fields = HashMap::new();
                fields.insert(field.to_string(), owner.to_string());
                vacant.insert(Entry {
                    value: Value::Fields(fields),
                    expires_at,
                });
                debug!(key, field, owner, "Acquired lock field");
                Ok(true)
            }
        }
    }

    async fn renew_if_owner(
        &self,
        key: &str,
        field: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        match Self::live_entry(&mut entries, key) {
            Some(entry) => match &entry.value {
                Value::Fields(fields) if fields.get(field).map(String::as_str) == Some(owner) => {
                    entry.expires_at = Some(Timestamp::now().add(ttl));
                    Ok(true)
                }
                Value::Fields(_) => Ok(false),
                other => Err(Self::wrong_type(key, other)),
            },
            None => Ok(false),
        }
    }

    async fn delete_field_if_owner(
        &self,
        key: &str,
        field: &str,
        owner: &str,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock();
        let now_empty = match Self::live_entry(&mut entries, key) {
            Some(entry) => match &mut entry.value {
                Value::Fields(fields) => {
                    if fields.get(field).map(String::as_str) != Some(owner) {
                        return Ok(false);
                    }
                    fields.remove(field);
                    fields.is_empty()
                }
                other => return Err(Self::wrong_type(key, other)),
            },
            None => return Ok(false),
        };
        if now_empty {
            entries.remove(key);
        }
        debug!(key, field, owner, "Deleted lock field");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_bit_roundtrip() {
        let store = MemoryStore::new();
        assert!(!store.get_bit("bf", 12345).await.unwrap());

        let previous = store.set_bit("bf", 12345, true).await.unwrap();
        assert!(!previous);
        assert!(store.get_bit("bf", 12345).await.unwrap());
        // Neighboring offsets stay clear.
        assert!(!store.get_bit("bf", 12344).await.unwrap());
        assert!(!store.get_bit("bf", 12346).await.unwrap());

        let previous = store.set_bit("bf", 12345, false).await.unwrap();
        assert!(previous);
        assert!(!store.get_bit("bf", 12345).await.unwrap());
    }

    #[tokio::test]
    async fn test_sparse_offsets() {
        let store = MemoryStore::new();
        // A high offset must not allocate the whole range below it.
        store.set_bit("bf", 999_999_999, true).await.unwrap();
        assert!(store.get_bit("bf", 999_999_999).await.unwrap());
        assert!(!store.get_bit("bf", 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_if_absent_wins_once() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(5);
        assert!(store.set_if_absent("dedup", "1", ttl).await.unwrap());
        assert!(!store.set_if_absent("dedup", "1", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_if_absent_expires() {
        let store = MemoryStore::new();
        let ttl = Duration::from_millis(50);
        assert!(store.set_if_absent("dedup", "1", ttl).await.unwrap());
        sleep(Duration::from_millis(120)).await;
        assert!(store.set_if_absent("dedup", "1", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_acquire_field_exclusive() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(5);
        assert!(store.acquire_field("lock", "f", "a", ttl).await.unwrap());
        assert!(!store.acquire_field("lock", "f", "b", ttl).await.unwrap());
        // Even the same owner is refused at the store level; reentrancy
        // is client-side bookkeeping.
        assert!(!store.acquire_field("lock", "f", "a", ttl).await.unwrap());
        assert_eq!(store.field_value("lock", "f"), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_acquire_field_after_expiry() {
        let store = MemoryStore::new();
        assert!(store
            .acquire_field("lock", "f", "a", Duration::from_millis(50))
            .await
            .unwrap());
        sleep(Duration::from_millis(120)).await;
        assert!(store
            .acquire_field("lock", "f", "b", Duration::from_secs(5))
            .await
            .unwrap());
        assert_eq!(store.field_value("lock", "f"), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_renew_only_for_owner() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(5);
        store.acquire_field("lock", "f", "a", ttl).await.unwrap();

        assert!(store.renew_if_owner("lock", "f", "a", ttl).await.unwrap());
        assert!(!store.renew_if_owner("lock", "f", "b", ttl).await.unwrap());
        assert!(!store
            .renew_if_owner("lock", "other", "a", ttl)
            .await
            .unwrap());
        assert!(!store
            .renew_if_owner("missing", "f", "a", ttl)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_renew_extends_expiry() {
        let store = MemoryStore::new();
        store
            .acquire_field("lock", "f", "a", Duration::from_millis(80))
            .await
            .unwrap();
        sleep(Duration::from_millis(50)).await;
        assert!(store
            .renew_if_owner("lock", "f", "a", Duration::from_millis(80))
            .await
            .unwrap());
        sleep(Duration::from_millis(50)).await;
        // Without the renewal the key would have lapsed by now.
        assert!(store.key_exists("lock"));
    }

    #[tokio::test]
    async fn test_delete_only_for_owner() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(5);
        store.acquire_field("lock", "f", "a", ttl).await.unwrap();

        assert!(!store.delete_field_if_owner("lock", "f", "b").await.unwrap());
        assert!(store.key_exists("lock"));
        assert!(store.delete_field_if_owner("lock", "f", "a").await.unwrap());
        assert!(!store.key_exists("lock"));
        assert!(!store.delete_field_if_owner("lock", "f", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let store = MemoryStore::new();
        store
            .set_if_absent("k", "v", Duration::from_secs(5))
            .await
            .unwrap();
        let err = store.get_bit("k", 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_time_to_live() {
        let store = MemoryStore::new();
        store
            .set_if_absent("k", "v", Duration::from_secs(5))
            .await
            .unwrap();
        let ttl = store.time_to_live("k").unwrap();
        assert!(ttl <= Duration::from_secs(5));
        assert!(ttl > Duration::from_secs(3));
        assert!(store.time_to_live("missing").is_none());
    }
}
