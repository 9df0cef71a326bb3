//! Serialization adapter over the key-value engine.
//!
//! Values are stored as JSON strings. Every engine failure and every
//! (de)serialization failure surfaces as a [`StorageError`] tagged with the
//! tier, the operation and, for key-addressed calls, the key.

use std::sync::Arc;

use secrecy::SecretString;
use serde::{de::DeserializeOwned, Serialize};
use tierstore_db::{EngineProvider, KvEngine, PartitionConfig};

use super::error::{ErrorContext, StorageError, StorageResult};
use super::types::{Operation, Tier};

/// Typed access to one tier's engine partition.
pub struct StorageAdapter {
    tier: Tier,
    engine: Arc<dyn KvEngine>,
}

impl std::fmt::Debug for StorageAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAdapter")
            .field("tier", &self.tier)
            .finish_non_exhaustive()
    }
}

impl StorageAdapter {
    /// Opens the partition named after `tier`.
    pub(crate) fn open(
        tier: Tier,
        engines: &dyn EngineProvider,
        encryption_key: Option<SecretString>,
    ) -> StorageResult<Self> {
        let mut config = PartitionConfig::new(tier.as_ref(), tier.partition_location());
        config.encryption_key = encryption_key;
        let engine = engines
            .open(&config)
            .map_err(|err| StorageError::from_db(ErrorContext::new(tier, Operation::Initialize), err))?;
        Ok(Self { tier, engine })
    }

    /// Returns the tier this adapter belongs to.
    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    fn keyed(&self, operation: Operation, key: &str) -> ErrorContext {
        ErrorContext::keyed(self.tier, operation, key)
    }

    /// Serializes `value` and stores it under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if `value` cannot be encoded and
    /// [`StorageError::Io`] if the engine write fails.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let raw = serde_json::to_string(value)
            .map_err(|err| StorageError::serialization(self.keyed(Operation::Set, key), err))?;
        self.set_raw(key, &raw)
    }

    /// Reads and parses the value under `key`. A missing key is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the engine read fails and
    /// [`StorageError::Deserialization`] if the stored bytes do not parse.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        self.get_raw(key)?
            .map(|raw| self.parse(Operation::Get, key, &raw))
            .transpose()
    }

    /// Like [`get`](Self::get), returning `default` for a missing key.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get); a corrupt value is an error, not a default.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> StorageResult<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    pub(crate) fn parse<T: DeserializeOwned>(
        &self,
        operation: Operation,
        key: &str,
        raw: &str,
    ) -> StorageResult<T> {
        serde_json::from_str(raw)
            .map_err(|err| StorageError::deserialization(self.keyed(operation, key), err))
    }

    pub(crate) fn set_raw(&self, key: &str, raw: &str) -> StorageResult<()> {
        self.engine
            .set_string(key, raw)
            .map_err(|err| StorageError::from_db(self.keyed(Operation::Set, key), err))
    }

    pub(crate) fn get_raw(&self, key: &str) -> StorageResult<Option<String>> {
        self.read_raw(Operation::Get, key)
    }

    pub(crate) fn read_raw(&self, operation: Operation, key: &str) -> StorageResult<Option<String>> {
        self.engine
            .get_string(key)
            .map_err(|err| StorageError::from_db(self.keyed(operation, key), err))
    }

    /// Removes `key`. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the engine write fails.
    pub fn delete(&self, key: &str) -> StorageResult<()> {
        self.delete_as(Operation::Delete, key)
    }

    pub(crate) fn delete_as(&self, operation: Operation, key: &str) -> StorageResult<()> {
        self.engine
            .delete(key)
            .map_err(|err| StorageError::from_db(self.keyed(operation, key), err))
    }

    /// Removes every key in the tier.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the engine write fails.
    pub fn clear(&self) -> StorageResult<()> {
        self.engine
            .clear_all()
            .map_err(|err| StorageError::from_db(ErrorContext::new(self.tier, Operation::Clear), err))
    }

    /// Lists every key in the tier.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the engine read fails.
    pub fn all_keys(&self) -> StorageResult<Vec<String>> {
        self.keys_as(Operation::GetAllKeys)
    }

    pub(crate) fn keys_as(&self, operation: Operation) -> StorageResult<Vec<String>> {
        self.engine
            .all_keys()
            .map_err(|err| StorageError::from_db(ErrorContext::new(self.tier, operation), err))
    }

    /// Returns `true` if `key` is stored.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the engine read fails.
    pub fn contains(&self, key: &str) -> StorageResult<bool> {
        self.engine
            .contains(key)
            .map_err(|err| StorageError::from_db(self.keyed(Operation::Contains, key), err))
    }

    /// Sums the byte length of every stored value in the tier. Encrypted tiers
    /// report the sealed length, which needs no key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the engine read fails.
    pub fn size(&self) -> StorageResult<u64> {
        self.size_as(Operation::GetSize)
    }

    pub(crate) fn size_as(&self, operation: Operation) -> StorageResult<u64> {
        let mut total = 0u64;
        for key in self.keys_as(operation)? {
            let stored = self
                .engine
                .stored_size(&key)
                .map_err(|err| StorageError::from_db(self.keyed(operation, &key), err))?;
            total = total.saturating_add(stored.unwrap_or(0));
        }
        Ok(total)
    }

    /// Deletes every key starting with `prefix` and returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if listing or deleting fails.
    pub fn delete_prefix(&self, prefix: &str) -> StorageResult<usize> {
        self.delete_where(|key| key.starts_with(prefix))
    }

    pub(crate) fn delete_where(&self, matches: impl Fn(&str) -> bool) -> StorageResult<usize> {
        let mut removed = 0;
        for key in self.keys_as(Operation::Delete)? {
            if matches(&key) {
                self.delete(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

pub(crate) fn byte_len(raw: &str) -> u64 {
    u64::try_from(raw.len()).unwrap_or(u64::MAX)
}

/// The adapter contract shared by every tier.
///
/// Tiers supply their adapter; `set` and `get` may be overridden by tiers that
/// wrap values (the cache stores TTL envelopes).
pub trait TierStore {
    /// Returns the tier's adapter.
    fn adapter(&self) -> &StorageAdapter;

    /// Returns the tier identity.
    fn tier(&self) -> Tier {
        self.adapter().tier()
    }

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// See [`StorageAdapter::set`].
    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        self.adapter().set(key, value)
    }

    /// Reads the value under `key`.
    ///
    /// # Errors
    ///
    /// See [`StorageAdapter::get`].
    fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        self.adapter().get(key)
    }

    /// Reads the value under `key`, or `default` when absent.
    ///
    /// # Errors
    ///
    /// See [`StorageAdapter::get`].
    fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> StorageResult<T> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// See [`StorageAdapter::delete`].
    fn delete(&self, key: &str) -> StorageResult<()> {
        self.adapter().delete(key)
    }

    /// Removes every key in the tier.
    ///
    /// # Errors
    ///
    /// See [`StorageAdapter::clear`].
    fn clear(&self) -> StorageResult<()> {
        self.adapter().clear()
    }

    /// Lists every key in the tier.
    ///
    /// # Errors
    ///
    /// See [`StorageAdapter::all_keys`].
    fn all_keys(&self) -> StorageResult<Vec<String>> {
        self.adapter().all_keys()
    }

    /// Returns `true` if `key` is stored.
    ///
    /// # Errors
    ///
    /// See [`StorageAdapter::contains`].
    fn contains(&self, key: &str) -> StorageResult<bool> {
        self.adapter().contains(key)
    }

    /// Total stored bytes in the tier.
    ///
    /// # Errors
    ///
    /// See [`StorageAdapter::size`].
    fn size(&self) -> StorageResult<u64> {
        self.adapter().size()
    }

    /// Number of stored keys.
    ///
    /// # Errors
    ///
    /// See [`StorageAdapter::all_keys`].
    fn len(&self) -> StorageResult<usize> {
        Ok(self.all_keys()?.len())
    }

    /// Returns `true` if the tier holds no keys.
    ///
    /// # Errors
    ///
    /// See [`StorageAdapter::all_keys`].
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Deletes every key starting with `prefix`.
    ///
    /// # Errors
    ///
    /// See [`StorageAdapter::delete_prefix`].
    fn delete_prefix(&self, prefix: &str) -> StorageResult<usize> {
        self.adapter().delete_prefix(prefix)
    }
}
