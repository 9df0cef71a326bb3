//! Platform interfaces the storage tiers depend on.

use std::sync::Arc;

use async_trait::async_trait;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use tierstore_db::EngineProvider;

use super::clock::{Clock, SystemClock};

/// Failure reported by a platform service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct PlatformError(pub String);

impl PlatformError {
    /// Creates a platform error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Accessibility class requested when persisting a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAccessibility {
    /// Readable only while the device is unlocked; never migrates to another
    /// device through backups.
    WhenUnlockedThisDeviceOnly,
}

/// Platform secure credential store (iOS Keychain, Android Keystore).
///
/// Holds only the storage encryption key, never application data.
#[async_trait]
pub trait SecureCredentialStore: Send + Sync {
    /// Reads the item stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    async fn get_item(&self, name: &str) -> Result<Option<String>, PlatformError>;

    /// Stores `value` under `name` with the given accessibility.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    async fn set_item(
        &self,
        name: &str,
        value: &str,
        accessibility: KeyAccessibility,
    ) -> Result<(), PlatformError>;

    /// Removes the item stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the delete.
    async fn delete_item(&self, name: &str) -> Result<(), PlatformError>;
}

/// Cryptographically secure randomness.
#[async_trait]
pub trait RandomSource: Send + Sync {
    /// Returns `len` random bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform cannot supply randomness.
    async fn random_bytes(&self, len: usize) -> Result<Vec<u8>, PlatformError>;
}

/// Randomness from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomSource;

#[async_trait]
impl RandomSource for OsRandomSource {
    async fn random_bytes(&self, len: usize) -> Result<Vec<u8>, PlatformError> {
        let mut bytes = vec![0u8; len];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|err| PlatformError::new(err.to_string()))?;
        Ok(bytes)
    }
}

/// Bundle of platform components used to build the storage tiers.
pub trait StorageProvider: Send + Sync {
    /// Returns the engine that opens tier partitions.
    fn engine_provider(&self) -> Arc<dyn EngineProvider>;

    /// Returns the platform secure credential store.
    fn credential_store(&self) -> Arc<dyn SecureCredentialStore>;

    /// Returns the randomness source used for key generation.
    fn random_source(&self) -> Arc<dyn RandomSource> {
        Arc::new(OsRandomSource)
    }

    /// Returns the clock used for TTL bookkeeping.
    fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(SystemClock)
    }
}
