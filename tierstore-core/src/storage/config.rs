//! Storage configuration.

use serde::{Deserialize, Serialize};

/// Default cache eviction cap: 20 MiB.
pub const DEFAULT_CACHE_MAX_BYTES: u64 = 20 * 1024 * 1024;
/// Default threshold for [`StorageManager::is_storage_full`](super::StorageManager::is_storage_full): 50 MiB.
pub const DEFAULT_STORAGE_FULL_THRESHOLD_BYTES: u64 = 50 * 1024 * 1024;
/// Default name of the encryption key in the secure credential store.
pub const DEFAULT_ENCRYPTION_KEY_NAME: &str = "tierstore.encryption_key";

/// What to do when the secure credential store cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFallbackPolicy {
    /// Fail initialization.
    #[default]
    FailHard,
    /// Open the secure tier with a freshly generated in-memory key. Data
    /// written under it is unreadable after a restart.
    EphemeralKey,
}

/// Tunables for the storage tiers. Every field has a default, so a partial
/// JSON document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Cache size cap used by eviction.
    pub cache_max_bytes: u64,
    /// Total size above which storage counts as full.
    pub storage_full_threshold_bytes: u64,
    /// Name of the encryption key entry in the secure credential store.
    pub encryption_key_name: String,
    /// Behaviour when the secure credential store is unavailable.
    pub key_fallback: KeyFallbackPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_max_bytes: DEFAULT_CACHE_MAX_BYTES,
            storage_full_threshold_bytes: DEFAULT_STORAGE_FULL_THRESHOLD_BYTES,
            encryption_key_name: DEFAULT_ENCRYPTION_KEY_NAME.to_string(),
            key_fallback: KeyFallbackPolicy::default(),
        }
    }
}

impl StorageConfig {
    /// Parses a configuration from JSON, defaulting missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON or a field has the
    /// wrong type.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.cache_max_bytes, 20_971_520);
        assert_eq!(config.storage_full_threshold_bytes, 52_428_800);
        assert_eq!(config.key_fallback, KeyFallbackPolicy::FailHard);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            StorageConfig::from_json(r#"{"cache_max_bytes": 1024, "key_fallback": "ephemeral_key"}"#)
                .expect("parse");
        assert_eq!(config.cache_max_bytes, 1024);
        assert_eq!(config.key_fallback, KeyFallbackPolicy::EphemeralKey);
        assert_eq!(config.encryption_key_name, DEFAULT_ENCRYPTION_KEY_NAME);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(StorageConfig::from_json(r#"{"cache_max_bytes": "big"}"#).is_err());
    }
}
