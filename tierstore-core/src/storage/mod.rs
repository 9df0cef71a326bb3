//! Tiered key-value storage: preferences, TTL cache, encrypted secrets and
//! ephemeral session data, composed by [`StorageManager`].
//!
//! Every tier opens its own partition of the same embedded engine
//! (`tierstore-db`) and stores JSON. Only the secure tier needs key material,
//! which makes [`StorageContext::initialize_storage`] the one async entry
//! point; all tier operations are synchronous.

pub mod adapter;
mod attempt;
pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod manager;
pub mod memory;
pub mod paths;
pub mod preferences;
pub mod secure;
pub mod temp;
pub mod traits;
pub mod types;

#[cfg(test)]
mod tests_utils;

pub use adapter::{StorageAdapter, TierStore};
pub use cache::CacheStorage;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{KeyFallbackPolicy, StorageConfig};
pub use context::StorageContext;
pub use envelope::StorageEntry;
pub use error::{ErrorContext, ErrorKind, StorageError, StorageResult};
pub use keys::{EncryptionKey, KeyOrigin, KeyProvisioner};
pub use manager::{StorageManager, REDACTED_PLACEHOLDER};
pub use memory::{MemoryCredentialStore, MemoryStorageProvider};
pub use paths::{PlatformStorageProvider, StoragePaths};
pub use preferences::{PreferencesStorage, Theme};
pub use secure::{Credentials, SecureStorage};
pub use temp::TempStorage;
pub use traits::{
    KeyAccessibility, OsRandomSource, PlatformError, RandomSource, SecureCredentialStore,
    StorageProvider,
};
pub use types::{
    ItemCounts, MaintenanceReport, Operation, StorageExport, StorageSizes, StorageStatistics,
    SweepReport, Tier,
};
