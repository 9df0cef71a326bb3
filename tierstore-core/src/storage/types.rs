//! Shared storage types.

use std::collections::BTreeMap;

use serde::Serialize;
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use tierstore_db::PartitionLocation;

use super::error::StorageError;

/// Identity of one of the four isolated storage partitions.
///
/// The string form selects the engine partition and tags every error raised
/// from the tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Tier {
    /// Small durable settings, unencrypted.
    Preferences,
    /// TTL-enveloped cached data, size bounded.
    Cache,
    /// Encrypted secrets.
    Secure,
    /// Ephemeral session data, wiped on startup.
    Temp,
}

impl Tier {
    /// Every tier, in the order they are reported.
    pub const ALL: [Self; 4] = [Self::Preferences, Self::Cache, Self::Secure, Self::Temp];

    /// Backup class of the tier's partition.
    #[must_use]
    pub const fn partition_location(self) -> PartitionLocation {
        match self {
            Self::Temp => PartitionLocation::NoBackup,
            Self::Preferences | Self::Cache | Self::Secure => PartitionLocation::Backed,
        }
    }
}

/// Name of the operation an error was raised from.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Initialize,
    Set,
    Get,
    Delete,
    Clear,
    GetAllKeys,
    Contains,
    GetSize,
    GetExpiration,
    ClearExpired,
    EvictOldest,
    KeyRetrieval,
    KeyGeneration,
    KeyStorage,
    KeyRotation,
}

/// Outcome of a best-effort sweep over a tier.
///
/// Per-key failures do not abort the sweep; they are logged and collected
/// here while the remaining keys are still processed.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Keys deleted by the sweep, in deletion order.
    pub removed: Vec<String>,
    /// Sum of the stored sizes of the removed values.
    pub freed_bytes: u64,
    /// Keys that could not be processed, with the reason.
    pub failures: Vec<(String, StorageError)>,
}

impl SweepReport {
    /// Number of keys deleted.
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    /// Returns `true` if every key was processed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn record_removal(&mut self, key: String, bytes: u64) {
        self.removed.push(key);
        self.freed_bytes = self.freed_bytes.saturating_add(bytes);
    }

    pub(crate) fn record_failure(&mut self, key: String, err: StorageError) {
        log::warn!("skipping entry {key} during sweep: {err}");
        self.failures.push((key, err));
    }
}

/// Result of startup cleanup or periodic maintenance.
#[derive(Debug, Default)]
pub struct MaintenanceReport {
    /// Whether the temp tier was wiped.
    pub temp_wiped: bool,
    /// Expired cache entries removed.
    pub expired: SweepReport,
    /// Size-based eviction, when it ran.
    pub evicted: Option<SweepReport>,
}

/// Stored bytes per tier.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageSizes {
    pub preferences: u64,
    pub cache: u64,
    pub secure: u64,
    pub temp: u64,
}

impl StorageSizes {
    /// Sum over all tiers.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.preferences
            .saturating_add(self.cache)
            .saturating_add(self.secure)
            .saturating_add(self.temp)
    }
}

/// Number of stored keys per tier.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemCounts {
    pub preferences: usize,
    pub cache: usize,
    pub secure: usize,
    pub temp: usize,
}

/// Aggregated view over all tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageStatistics {
    /// Keys stored per tier.
    pub item_counts: ItemCounts,
    /// Bytes stored per tier.
    pub sizes: StorageSizes,
    /// Soonest expiration (epoch millis) among cache entries that carry a TTL.
    pub earliest_cache_expiration: Option<u64>,
}

/// Diagnostic dump of every tier. Secure values are redacted.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StorageExport {
    pub preferences: BTreeMap<String, serde_json::Value>,
    pub cache: BTreeMap<String, serde_json::Value>,
    pub secure: BTreeMap<String, serde_json::Value>,
    pub temp: BTreeMap<String, serde_json::Value>,
}
