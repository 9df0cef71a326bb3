//! TTL envelope stored for cache entries.

use serde::{Deserialize, Serialize};

/// A cached value with its write time and optional lifetime.
///
/// `ttl` is always relative to `timestamp`; an entry without `ttl` never
/// expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry<T> {
    /// The stored value.
    pub value: T,
    /// Write time, epoch millis.
    pub timestamp: u64,
    /// Lifetime in millis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

impl<T> StorageEntry<T> {
    /// Creates an envelope written at `timestamp`.
    pub const fn new(value: T, timestamp: u64, ttl: Option<u64>) -> Self {
        Self {
            value,
            timestamp,
            ttl,
        }
    }

    /// Absolute expiration time (epoch millis), if the entry has a TTL.
    #[must_use]
    pub fn expires_at(&self) -> Option<u64> {
        expires_at(self.timestamp, self.ttl)
    }

    /// Returns `true` once `now` has reached the expiration time.
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        is_expired(self.expires_at(), now)
    }
}

/// Envelope header without the value, for sweeps that only look at timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub(crate) struct EntryMeta {
    pub(crate) timestamp: u64,
    #[serde(default)]
    pub(crate) ttl: Option<u64>,
}

impl EntryMeta {
    pub(crate) fn expires_at(&self) -> Option<u64> {
        expires_at(self.timestamp, self.ttl)
    }

    pub(crate) fn is_expired(&self, now: u64) -> bool {
        is_expired(self.expires_at(), now)
    }
}

fn expires_at(timestamp: u64, ttl: Option<u64>) -> Option<u64> {
    ttl.map(|ttl| timestamp.saturating_add(ttl))
}

fn is_expired(expires_at: Option<u64>, now: u64) -> bool {
    expires_at.is_some_and(|expires_at| now >= expires_at)
}
