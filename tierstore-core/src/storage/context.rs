//! Owned handle replacing the process-wide storage singleton.

use std::sync::Arc;

use futures::FutureExt;

use super::attempt::SharedAttempt;
use super::config::StorageConfig;
use super::error::{StorageError, StorageResult};
use super::keys::KeyProvisioner;
use super::manager::StorageManager;
use super::traits::StorageProvider;

/// Builds the [`StorageManager`] at most once and hands it out afterwards.
///
/// Construct one per process at startup and thread it through the app.
/// Concurrent [`initialize_storage`](Self::initialize_storage) calls share one
/// attempt and all receive its result; a failed attempt leaves the context
/// uninitialized so the next call starts over.
pub struct StorageContext {
    provider: Arc<dyn StorageProvider>,
    config: StorageConfig,
    provisioner: Arc<KeyProvisioner>,
    manager: SharedAttempt<StorageManager>,
}

impl std::fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageContext")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl StorageContext {
    /// Creates an uninitialized context.
    pub fn new(provider: Arc<dyn StorageProvider>, config: StorageConfig) -> Self {
        let provisioner = KeyProvisioner::new(
            provider.credential_store(),
            provider.random_source(),
            config.encryption_key_name.clone(),
            config.key_fallback,
        );
        Self {
            provider,
            config,
            provisioner: Arc::new(provisioner),
            manager: SharedAttempt::new(),
        }
    }

    /// Provisions the encryption key, opens every tier and runs startup
    /// cleanup. Later calls return the same manager.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Initialization`] wrapping the failing step.
    pub async fn initialize_storage(&self) -> StorageResult<Arc<StorageManager>> {
        let provider = Arc::clone(&self.provider);
        let provisioner = Arc::clone(&self.provisioner);
        let config = self.config.clone();
        self.manager
            .get_or_try_init(move || create(provider, provisioner, config).boxed())
            .await
    }

    /// Returns the manager.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotInitialized`] until
    /// [`initialize_storage`](Self::initialize_storage) has succeeded.
    pub fn storage(&self) -> StorageResult<Arc<StorageManager>> {
        self.manager.get().ok_or(StorageError::NotInitialized)
    }

    /// Returns `true` once initialization has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.manager.is_ready()
    }

    /// Configuration this context builds the manager with.
    #[must_use]
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }
}

async fn create(
    provider: Arc<dyn StorageProvider>,
    provisioner: Arc<KeyProvisioner>,
    config: StorageConfig,
) -> StorageResult<Arc<StorageManager>> {
    let result = async {
        let manager = StorageManager::initialize(provider.as_ref(), &provisioner, config).await?;
        manager
            .perform_startup_cleanup()
            .map_err(StorageError::initialization)?;
        Ok::<_, StorageError>(Arc::new(manager))
    }
    .await;
    match &result {
        Ok(_) => log::debug!("storage initialized"),
        Err(err) => log::error!("storage initialization failed: {err}"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::ErrorKind;
    use crate::storage::memory::MemoryStorageProvider;

    #[tokio::test]
    async fn test_storage_before_initialize_fails() {
        let context = StorageContext::new(
            Arc::new(MemoryStorageProvider::new()),
            StorageConfig::default(),
        );
        let err = context.storage().expect_err("not initialized");
        assert_eq!(err.kind(), ErrorKind::NotInitialized);
        assert!(!context.is_initialized());

        let manager = context.initialize_storage().await.expect("initialize");
        assert!(Arc::ptr_eq(&manager, &context.storage().expect("storage")));
        assert!(context.is_initialized());
    }
}
