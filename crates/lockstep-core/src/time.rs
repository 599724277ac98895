//! Timestamps for lease bookkeeping.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Timestamp in milliseconds since the Unix epoch.
///
/// Used for lock-frame creation times, lease-loss events, and key
/// expiries in the in-memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since the Unix epoch.
    pub const fn new(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the current time as a timestamp.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("System time before Unix epoch");
        Self(duration.as_millis() as i64)
    }

    /// Milliseconds since the Unix epoch.
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Adds a duration, saturating.
    pub fn add(&self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.as_millis() as i64))
    }

    /// Returns true if this timestamp is strictly after `other`.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Duration between two timestamps, `None` if `earlier` is later.
    pub fn duration_since(&self, earlier: &Timestamp) -> Option<Duration> {
        if self.0 >= earlier.0 {
            Some(Duration::from_millis((self.0 - earlier.0) as u64))
        } else {
            None
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Self(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_recent() {
        let ts = Timestamp::now();
        // After 2024-01-01.
        assert!(ts.0 > 1_704_067_200_000);
    }

    #[test]
    fn test_arithmetic() {
        let ts = Timestamp::new(1_000_000);
        let later = ts.add(Duration::from_millis(5000));
        assert_eq!(later.as_millis(), 1_005_000);
        assert!(later.is_after(&ts));
        assert_eq!(
            later.duration_since(&ts),
            Some(Duration::from_millis(5000))
        );
        assert!(ts.duration_since(&later).is_none());
    }
}
