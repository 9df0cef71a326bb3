//! Composition root over the four tiers.

use std::collections::BTreeMap;

use serde_json::Value;

use super::adapter::{StorageAdapter, TierStore};
use super::cache::CacheStorage;
use super::config::StorageConfig;
use super::error::{StorageError, StorageResult};
use super::keys::KeyProvisioner;
use super::preferences::PreferencesStorage;
use super::secure::SecureStorage;
use super::temp::TempStorage;
use super::traits::StorageProvider;
use super::types::{
    ItemCounts, MaintenanceReport, Operation, StorageExport, StorageSizes, StorageStatistics,
};

/// Placeholder written in place of every secure value by
/// [`StorageManager::export_all_data`].
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// Cache key prefixes holding user-scoped data, removed on logout.
const USER_CACHE_PREFIXES: [&str; 2] = ["user_", "auth_"];

/// Owns one instance of each tier. Built only through
/// [`StorageContext::initialize_storage`](super::StorageContext::initialize_storage).
#[derive(Debug)]
pub struct StorageManager {
    preferences: PreferencesStorage,
    cache: CacheStorage,
    secure: SecureStorage,
    temp: TempStorage,
    config: StorageConfig,
}

impl StorageManager {
    /// Provisions the encryption key, opens the secure tier, then the other
    /// three. Any failure is reported as [`StorageError::Initialization`].
    pub(crate) async fn initialize(
        provider: &dyn StorageProvider,
        provisioner: &KeyProvisioner,
        config: StorageConfig,
    ) -> StorageResult<Self> {
        let key = provisioner
            .encryption_key()
            .await
            .map_err(StorageError::initialization)?;
        let engines = provider.engine_provider();
        let secure =
            SecureStorage::open(engines.as_ref(), &key).map_err(StorageError::initialization)?;
        let preferences =
            PreferencesStorage::open(engines.as_ref()).map_err(StorageError::initialization)?;
        let cache = CacheStorage::open(engines.as_ref(), provider.clock(), config.cache_max_bytes)
            .map_err(StorageError::initialization)?;
        let temp = TempStorage::open(engines.as_ref()).map_err(StorageError::initialization)?;

        Ok(Self {
            preferences,
            cache,
            secure,
            temp,
            config,
        })
    }

    /// Preferences tier.
    #[must_use]
    pub const fn preferences(&self) -> &PreferencesStorage {
        &self.preferences
    }

    /// Cache tier.
    #[must_use]
    pub const fn cache(&self) -> &CacheStorage {
        &self.cache
    }

    /// Secure tier.
    #[must_use]
    pub const fn secure(&self) -> &SecureStorage {
        &self.secure
    }

    /// Temp tier.
    #[must_use]
    pub const fn temp(&self) -> &TempStorage {
        &self.temp
    }

    /// Configuration the manager was built with.
    #[must_use]
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Wipes temp, sweeps expired cache entries, then evicts the cache down to
    /// the configured cap. Always in that order.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp wipe fails or a sweep cannot list keys.
    /// Per-entry failures are reported, not raised.
    pub fn perform_startup_cleanup(&self) -> StorageResult<MaintenanceReport> {
        self.temp.initialize()?;
        let expired = self.cache.clear_expired()?;
        let evicted = self.cache.evict_to_capacity()?;
        let report = MaintenanceReport {
            temp_wiped: true,
            expired,
            evicted: Some(evicted),
        };
        log::debug!(
            "startup cleanup: {} expired, {} evicted",
            report.expired.removed_count(),
            report.evicted.as_ref().map_or(0, |sweep| sweep.removed_count())
        );
        Ok(report)
    }

    /// Sweeps expired cache entries, and evicts only if storage is full.
    ///
    /// # Errors
    ///
    /// Returns an error if a sweep cannot list keys or sizes cannot be read.
    pub fn perform_maintenance(&self) -> StorageResult<MaintenanceReport> {
        let expired = self.cache.clear_expired()?;
        let evicted = if self.is_storage_full()? {
            Some(self.cache.evict_to_capacity()?)
        } else {
            None
        };
        log::debug!(
            "maintenance: {} expired, eviction {}",
            expired.removed_count(),
            if evicted.is_some() { "ran" } else { "skipped" }
        );
        Ok(MaintenanceReport {
            temp_wiped: false,
            expired,
            evicted,
        })
    }

    /// Clears all four tiers. Every tier is attempted; the first failure is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the first tier clear that failed.
    pub fn clear_all(&self) -> StorageResult<()> {
        let results = [
            self.preferences.clear(),
            self.cache.clear(),
            self.secure.clear(),
            self.temp.clear(),
        ];
        results.into_iter().collect()
    }

    /// Logout: clears secure and temp, and the user-scoped cache entries
    /// (`user_*`, `auth_*`). Shared cache entries survive.
    ///
    /// # Errors
    ///
    /// Returns the first failure.
    pub fn clear_user_data(&self) -> StorageResult<()> {
        self.secure.clear()?;
        self.temp.clear()?;
        self.cache
            .adapter()
            .delete_where(|key| USER_CACHE_PREFIXES.iter().any(|prefix| key.starts_with(prefix)))?;
        Ok(())
    }

    /// Stored bytes per tier.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier cannot be read.
    pub fn storage_sizes(&self) -> StorageResult<StorageSizes> {
        Ok(StorageSizes {
            preferences: self.preferences.size()?,
            cache: self.cache.size()?,
            secure: self.secure.size()?,
            temp: self.temp.size()?,
        })
    }

    /// Stored bytes across all tiers.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier cannot be read.
    pub fn total_size(&self) -> StorageResult<u64> {
        Ok(self.storage_sizes()?.total())
    }

    /// Whether the total size exceeds the configured threshold.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier cannot be read.
    pub fn is_storage_full(&self) -> StorageResult<bool> {
        self.is_storage_full_at(self.config.storage_full_threshold_bytes)
    }

    /// Whether the total size exceeds `threshold_bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier cannot be read.
    pub fn is_storage_full_at(&self, threshold_bytes: u64) -> StorageResult<bool> {
        Ok(self.total_size()? > threshold_bytes)
    }

    /// Dumps every tier for diagnostics. Secure values are replaced by
    /// [`REDACTED_PLACEHOLDER`] without being decrypted. Not a backup format.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier cannot be read.
    pub fn export_all_data(&self) -> StorageResult<StorageExport> {
        let secure = self
            .secure
            .all_keys()?
            .into_iter()
            .map(|key| (key, Value::String(REDACTED_PLACEHOLDER.to_string())))
            .collect();
        Ok(StorageExport {
            preferences: dump(self.preferences.adapter())?,
            cache: dump(self.cache.adapter())?,
            secure,
            temp: dump(self.temp.adapter())?,
        })
    }

    /// Item counts, sizes, and the soonest cache expiration.
    ///
    /// # Errors
    ///
    /// Returns an error if a tier cannot be read.
    pub fn statistics(&self) -> StorageResult<StorageStatistics> {
        Ok(StorageStatistics {
            item_counts: ItemCounts {
                preferences: self.preferences.len()?,
                cache: self.cache.len()?,
                secure: self.secure.len()?,
                temp: self.temp.len()?,
            },
            sizes: self.storage_sizes()?,
            earliest_cache_expiration: self.cache.earliest_expiration()?,
        })
    }
}

/// Raw stored values keyed by name. Values that are not valid JSON are kept as
/// strings.
fn dump(adapter: &StorageAdapter) -> StorageResult<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for key in adapter.keys_as(Operation::GetAllKeys)? {
        if let Some(raw) = adapter.read_raw(Operation::Get, &key)? {
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            out.insert(key, value);
        }
    }
    Ok(out)
}
