//! In-memory engine.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use crate::cipher::EncryptedEngine;
use crate::engine::{EngineProvider, KvEngine};
use crate::error::{DbError, DbResult};
use crate::partition::PartitionConfig;

/// A partition held in a `BTreeMap`.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryEngine {
    /// Creates an empty partition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvEngine for MemoryEngine {
    fn get_string(&self, key: &str) -> DbResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| DbError::poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn set_string(&self, key: &str, value: &str) -> DbResult<()> {
        self.entries
            .write()
            .map_err(|_| DbError::poisoned())?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> DbResult<()> {
        self.entries
            .write()
            .map_err(|_| DbError::poisoned())?
            .remove(key);
        Ok(())
    }

    fn clear_all(&self) -> DbResult<()> {
        self.entries
            .write()
            .map_err(|_| DbError::poisoned())?
            .clear();
        Ok(())
    }

    fn all_keys(&self) -> DbResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| DbError::poisoned())?;
        Ok(entries.keys().cloned().collect())
    }

    fn contains(&self, key: &str) -> DbResult<bool> {
        let entries = self.entries.read().map_err(|_| DbError::poisoned())?;
        Ok(entries.contains_key(key))
    }
}

/// Hands out [`MemoryEngine`] partitions by name.
///
/// Opening the same name twice returns the same underlying data, which lets a
/// host re-initialize storage within one process and observe what was written
/// before.
#[derive(Debug, Default)]
pub struct MemoryEngineProvider {
    partitions: Mutex<HashMap<String, Arc<MemoryEngine>>>,
}

impl MemoryEngineProvider {
    /// Creates a provider with no partitions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw backend of a partition, bypassing any encryption.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider mutex is poisoned.
    pub fn raw_partition(&self, name: &str) -> DbResult<Arc<MemoryEngine>> {
        let mut partitions = self.partitions.lock().map_err(|_| DbError::poisoned())?;
        Ok(Arc::clone(partitions.entry(name.to_string()).or_default()))
    }
}

impl EngineProvider for MemoryEngineProvider {
    fn open(&self, config: &PartitionConfig) -> DbResult<Arc<dyn KvEngine>> {
        let backend: Arc<dyn KvEngine> = self.raw_partition(&config.name)?;
        match &config.encryption_key {
            Some(key) => Ok(Arc::new(EncryptedEngine::new(backend, key, &config.name)?)),
            None => Ok(backend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionLocation;

    #[test]
    fn test_memory_engine_basic_ops() {
        let engine = MemoryEngine::new();
        engine.set_string("b", "2").expect("set");
        engine.set_string("a", "1").expect("set");

        assert_eq!(engine.get_string("a").expect("get"), Some("1".to_string()));
        assert!(engine.contains("b").expect("contains"));
        assert_eq!(engine.all_keys().expect("keys"), vec!["a", "b"]);

        engine.delete("a").expect("delete");
        engine.delete("a").expect("delete missing");
        assert!(!engine.contains("a").expect("contains"));

        engine.clear_all().expect("clear");
        assert!(engine.all_keys().expect("keys").is_empty());
    }

    #[test]
    fn test_provider_reopens_same_partition() {
        let provider = MemoryEngineProvider::new();
        let config = PartitionConfig::new("cache", PartitionLocation::Backed);
        provider
            .open(&config)
            .expect("open")
            .set_string("k", "v")
            .expect("set");

        let reopened = provider.open(&config).expect("reopen");
        assert_eq!(reopened.get_string("k").expect("get"), Some("v".to_string()));

        let other = provider
            .open(&PartitionConfig::new("temp", PartitionLocation::NoBackup))
            .expect("open other");
        assert!(!other.contains("k").expect("contains"));
    }
}
