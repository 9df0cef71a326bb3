//! Cache tier: values wrapped in TTL envelopes, size-bounded.
//!
//! Expiry is lazy. A read that finds an expired entry deletes it and reports
//! the key as absent; [`CacheStorage::clear_expired`] sweeps the rest.
//!
//! Eviction is by write time only. Reads are not tracked, so an entry that is
//! read often but was written long ago is as evictable as one never read.
//! Tracking read recency would turn every read into a write.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tierstore_db::EngineProvider;

use super::adapter::{StorageAdapter, TierStore};
use super::clock::Clock;
use super::envelope::{EntryMeta, StorageEntry};
use super::error::{ErrorContext, StorageError, StorageResult};
use super::types::{Operation, SweepReport, Tier};

mod maintenance;

/// TTL-aware cache over the `cache` partition.
pub struct CacheStorage {
    adapter: StorageAdapter,
    clock: Arc<dyn Clock>,
    max_bytes: u64,
}

impl std::fmt::Debug for CacheStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStorage")
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

impl TierStore for CacheStorage {
    fn adapter(&self) -> &StorageAdapter {
        &self.adapter
    }

    /// Stores `value` in an envelope without TTL. It never expires but is
    /// still subject to eviction.
    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        self.put(key, value, None)
    }

    /// Reads the value under `key`, deleting it and returning `None` if it has
    /// expired.
    fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(raw) = self.adapter.get_raw(key)? else {
            return Ok(None);
        };
        let entry: StorageEntry<T> = self.adapter.parse(Operation::Get, key, &raw)?;
        if entry.is_expired(self.clock.now_millis()) {
            self.adapter.delete_as(Operation::Get, key)?;
            return Ok(None);
        }
        Ok(Some(entry.value))
    }
}

impl CacheStorage {
    pub(crate) fn open(
        engines: &dyn EngineProvider,
        clock: Arc<dyn Clock>,
        max_bytes: u64,
    ) -> StorageResult<Self> {
        Ok(Self {
            adapter: StorageAdapter::open(Tier::Cache, engines, None)?,
            clock,
            max_bytes,
        })
    }

    /// Eviction cap used by [`evict_to_capacity`](Self::evict_to_capacity).
    #[must_use]
    pub const fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Stores `value` under `key`, expiring `ttl_seconds` from now.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized or the write fails.
    pub fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> StorageResult<()> {
        self.put(key, value, Some(ttl_seconds.saturating_mul(1000)))
    }

    fn put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_millis: Option<u64>,
    ) -> StorageResult<()> {
        let entry = StorageEntry::new(value, self.clock.now_millis(), ttl_millis);
        let raw = serde_json::to_string(&entry).map_err(|err| {
            StorageError::serialization(ErrorContext::keyed(Tier::Cache, Operation::Set, key), err)
        })?;
        self.adapter.set_raw(key, &raw)
    }

    /// Absolute expiration time (epoch millis) of `key`, or `None` if the key
    /// is missing or has no TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the envelope is corrupt.
    pub fn expiration(&self, key: &str) -> StorageResult<Option<u64>> {
        let Some(raw) = self.adapter.read_raw(Operation::GetExpiration, key)? else {
            return Ok(None);
        };
        let meta: EntryMeta = self.adapter.parse(Operation::GetExpiration, key, &raw)?;
        Ok(meta.expires_at())
    }

    /// Whole seconds left before `key` expires; `0` for entries that have
    /// expired but were not swept yet, `None` without a TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the envelope is corrupt.
    pub fn remaining_ttl(&self, key: &str) -> StorageResult<Option<u64>> {
        let now = self.clock.now_millis();
        Ok(self
            .expiration(key)?
            .map(|expires_at| expires_at.saturating_sub(now) / 1000))
    }

    /// Deletes every expired entry. Unreadable entries are logged, skipped and
    /// reported.
    ///
    /// # Errors
    ///
    /// Returns an error only if the key listing itself fails.
    pub fn clear_expired(&self) -> StorageResult<SweepReport> {
        maintenance::clear_expired(&self.adapter, self.clock.now_millis())
    }

    /// Deletes oldest-written entries until the tier size is at or under
    /// `max_bytes`. A no-op when already at or under.
    ///
    /// # Errors
    ///
    /// Returns an error only if the key listing itself fails.
    pub fn evict_oldest(&self, max_bytes: u64) -> StorageResult<SweepReport> {
        maintenance::evict_oldest(&self.adapter, max_bytes)
    }

    /// [`evict_oldest`](Self::evict_oldest) against the configured cap.
    ///
    /// # Errors
    ///
    /// Returns an error only if the key listing itself fails.
    pub fn evict_to_capacity(&self) -> StorageResult<SweepReport> {
        self.evict_oldest(self.max_bytes)
    }

    /// Soonest expiration among entries that carry a TTL.
    ///
    /// # Errors
    ///
    /// Returns an error only if the key listing itself fails.
    pub fn earliest_expiration(&self) -> StorageResult<Option<u64>> {
        maintenance::earliest_expiration(&self.adapter)
    }
}
