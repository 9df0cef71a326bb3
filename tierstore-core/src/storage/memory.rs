//! In-memory platform implementations.
//!
//! Not secure: the credential store keeps the key in process memory. Meant for
//! tests, simulators and development hosts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tierstore_db::{EngineProvider, MemoryEngineProvider};

use super::clock::{Clock, SystemClock};
use super::traits::{
    KeyAccessibility, OsRandomSource, PlatformError, RandomSource, SecureCredentialStore,
    StorageProvider,
};

/// Credential store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    items: Mutex<HashMap<String, (String, KeyAccessibility)>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the accessibility an item was stored with.
    #[must_use]
    pub fn accessibility(&self, name: &str) -> Option<KeyAccessibility> {
        self.items
            .lock()
            .ok()?
            .get(name)
            .map(|(_, accessibility)| *accessibility)
    }

    fn poisoned() -> PlatformError {
        PlatformError::new("credential store mutex poisoned")
    }
}

#[async_trait]
impl SecureCredentialStore for MemoryCredentialStore {
    async fn get_item(&self, name: &str) -> Result<Option<String>, PlatformError> {
        let items = self.items.lock().map_err(|_| Self::poisoned())?;
        Ok(items.get(name).map(|(value, _)| value.clone()))
    }

    async fn set_item(
        &self,
        name: &str,
        value: &str,
        accessibility: KeyAccessibility,
    ) -> Result<(), PlatformError> {
        self.items
            .lock()
            .map_err(|_| Self::poisoned())?
            .insert(name.to_string(), (value.to_string(), accessibility));
        Ok(())
    }

    async fn delete_item(&self, name: &str) -> Result<(), PlatformError> {
        self.items
            .lock()
            .map_err(|_| Self::poisoned())?
            .remove(name);
        Ok(())
    }
}

/// Provider wiring in-memory engines and credential store together.
///
/// Components are shared, so a second storage context built from the same
/// provider sees the same data and the same stored key.
pub struct MemoryStorageProvider {
    engines: Arc<MemoryEngineProvider>,
    credentials: Arc<dyn SecureCredentialStore>,
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemoryStorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorageProvider").finish_non_exhaustive()
    }
}

impl Default for MemoryStorageProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorageProvider {
    /// Creates a provider with fresh in-memory components and the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            engines: Arc::new(MemoryEngineProvider::new()),
            credentials: Arc::new(MemoryCredentialStore::new()),
            random: Arc::new(OsRandomSource),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the credential store.
    #[must_use]
    pub fn with_credential_store(mut self, credentials: Arc<dyn SecureCredentialStore>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Replaces the randomness source.
    #[must_use]
    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the in-memory engines, e.g. to inspect raw partition contents.
    #[must_use]
    pub fn engines(&self) -> &MemoryEngineProvider {
        &self.engines
    }
}

impl StorageProvider for MemoryStorageProvider {
    fn engine_provider(&self) -> Arc<dyn EngineProvider> {
        self.engines.clone()
    }

    fn credential_store(&self) -> Arc<dyn SecureCredentialStore> {
        Arc::clone(&self.credentials)
    }

    fn random_source(&self) -> Arc<dyn RandomSource> {
        Arc::clone(&self.random)
    }

    fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }
}
