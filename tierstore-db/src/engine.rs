//! Engine traits.

use std::sync::Arc;

use crate::error::DbResult;
use crate::partition::PartitionConfig;

/// A single partition of string keys to string values.
///
/// Implementations are internally synchronized; every call runs to completion
/// on the calling thread.
pub trait KvEngine: Send + Sync {
    /// Reads the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails or the value cannot be
    /// decrypted.
    fn get_string(&self, key: &str) -> DbResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails or the value cannot be
    /// encrypted.
    fn set_string(&self, key: &str, value: &str) -> DbResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    fn delete(&self, key: &str) -> DbResult<()>;

    /// Removes every key in the partition.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    fn clear_all(&self) -> DbResult<()>;

    /// Lists every key in the partition, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    fn all_keys(&self) -> DbResult<Vec<String>>;

    /// Returns `true` if `key` is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    fn contains(&self, key: &str) -> DbResult<bool>;

    /// Byte length of the value as persisted under `key`. For encrypted
    /// partitions this is the sealed length, so no key material is needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    fn stored_size(&self, key: &str) -> DbResult<Option<u64>> {
        Ok(self
            .get_string(key)?
            .map(|value| u64::try_from(value.len()).unwrap_or(u64::MAX)))
    }
}

/// Opens partitions by name.
pub trait EngineProvider: Send + Sync {
    /// Opens (or creates) the partition described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the partition cannot be opened.
    fn open(&self, config: &PartitionConfig) -> DbResult<Arc<dyn KvEngine>>;
}
