//! Test helpers for the storage tiers.

use std::sync::Arc;

use async_trait::async_trait;
use tierstore_db::{DbError, DbErrorKind, DbResult, EngineProvider, KvEngine, PartitionConfig};

use super::traits::{KeyAccessibility, PlatformError, SecureCredentialStore};

/// Engine whose every operation fails like a broken disk.
pub struct FailingEngine;

fn disk_error() -> DbError {
    DbError::new(DbErrorKind::Sqlite, "disk I/O error")
}

impl KvEngine for FailingEngine {
    fn get_string(&self, _key: &str) -> DbResult<Option<String>> {
        Err(disk_error())
    }

    fn set_string(&self, _key: &str, _value: &str) -> DbResult<()> {
        Err(disk_error())
    }

    fn delete(&self, _key: &str) -> DbResult<()> {
        Err(disk_error())
    }

    fn clear_all(&self) -> DbResult<()> {
        Err(disk_error())
    }

    fn all_keys(&self) -> DbResult<Vec<String>> {
        Err(disk_error())
    }

    fn contains(&self, _key: &str) -> DbResult<bool> {
        Err(disk_error())
    }
}

#[derive(Default)]
pub struct FailingEngineProvider {
    pub fail_open: bool,
}

impl EngineProvider for FailingEngineProvider {
    fn open(&self, _config: &PartitionConfig) -> DbResult<Arc<dyn KvEngine>> {
        if self.fail_open {
            return Err(DbError::new(DbErrorKind::Io, "permission denied"));
        }
        Ok(Arc::new(FailingEngine))
    }
}

/// Credential store that refuses every call, like a keychain before first
/// unlock.
pub struct LockedCredentialStore;

#[async_trait]
impl SecureCredentialStore for LockedCredentialStore {
    async fn get_item(&self, _name: &str) -> Result<Option<String>, PlatformError> {
        Err(PlatformError::new("keychain locked"))
    }

    async fn set_item(
        &self,
        _name: &str,
        _value: &str,
        _accessibility: KeyAccessibility,
    ) -> Result<(), PlatformError> {
        Err(PlatformError::new("keychain locked"))
    }

    async fn delete_item(&self, _name: &str) -> Result<(), PlatformError> {
        Err(PlatformError::new("keychain locked"))
    }
}
