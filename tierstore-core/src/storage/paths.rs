//! Storage path helpers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tierstore_db::{EngineProvider, SqliteEngineProvider};

use super::traits::{SecureCredentialStore, StorageProvider};

const STORAGE_DIRNAME: &str = "tierstore";

/// Directories holding the tier partitions.
///
/// The temp tier lives under `no_backup_dir`, which the host must exclude
/// from device backups (Android `noBackupFilesDir`, iOS `Caches` or a
/// directory flagged `isExcludedFromBackup`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    data_dir: PathBuf,
    no_backup_dir: PathBuf,
}

impl StoragePaths {
    /// Places partitions under `<data_root>/tierstore` and
    /// `<no_backup_root>/tierstore`.
    #[must_use]
    pub fn new(data_root: impl AsRef<Path>, no_backup_root: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_root.as_ref().join(STORAGE_DIRNAME),
            no_backup_dir: no_backup_root.as_ref().join(STORAGE_DIRNAME),
        }
    }

    /// Returns the backed-up partition directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the no-backup partition directory.
    #[must_use]
    pub fn no_backup_dir(&self) -> &Path {
        &self.no_backup_dir
    }

    /// Builds a `SQLite` engine provider over these directories.
    #[must_use]
    pub fn engine_provider(&self) -> SqliteEngineProvider {
        SqliteEngineProvider::new(&self.data_dir, &self.no_backup_dir)
    }
}

/// Durable provider: `SQLite` partitions on disk plus the host's credential
/// store.
pub struct PlatformStorageProvider {
    engines: Arc<SqliteEngineProvider>,
    credentials: Arc<dyn SecureCredentialStore>,
}

impl std::fmt::Debug for PlatformStorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformStorageProvider")
            .field("engines", &self.engines)
            .finish_non_exhaustive()
    }
}

impl PlatformStorageProvider {
    /// Creates a provider storing partitions under `paths`.
    #[must_use]
    pub fn new(paths: &StoragePaths, credentials: Arc<dyn SecureCredentialStore>) -> Self {
        Self {
            engines: Arc::new(paths.engine_provider()),
            credentials,
        }
    }
}

impl StorageProvider for PlatformStorageProvider {
    fn engine_provider(&self) -> Arc<dyn EngineProvider> {
        self.engines.clone()
    }

    fn credential_store(&self) -> Arc<dyn SecureCredentialStore> {
        Arc::clone(&self.credentials)
    }
}
