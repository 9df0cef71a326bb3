//! Common test utilities shared across integration tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tierstore_core::storage::{
    KeyAccessibility, MemoryCredentialStore, PlatformError, SecureCredentialStore,
};
use uuid::Uuid;

/// Credential store that counts calls and can be switched into a failing
/// state, like a keychain that is locked until first unlock.
#[derive(Default)]
pub struct FlakyCredentialStore {
    inner: MemoryCredentialStore,
    locked: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

#[allow(dead_code, reason = "not every test binary uses every helper")]
impl FlakyCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locked() -> Self {
        let store = Self::default();
        store.set_locked(true);
        store
    }

    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn stored(&self, name: &str) -> Option<String> {
        self.inner.get_item(name).await.expect("inner store")
    }

    pub async fn seed(&self, name: &str, value: &str) {
        self.inner
            .set_item(name, value, KeyAccessibility::WhenUnlockedThisDeviceOnly)
            .await
            .expect("inner store");
    }

    pub fn accessibility(&self, name: &str) -> Option<KeyAccessibility> {
        self.inner.accessibility(name)
    }

    fn check(&self) -> Result<(), PlatformError> {
        if self.locked.load(Ordering::SeqCst) {
            Err(PlatformError::new("keychain is locked"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SecureCredentialStore for FlakyCredentialStore {
    async fn get_item(&self, name: &str) -> Result<Option<String>, PlatformError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        // Give concurrent initializers a chance to interleave.
        tokio::task::yield_now().await;
        self.check()?;
        self.inner.get_item(name).await
    }

    async fn set_item(
        &self,
        name: &str,
        value: &str,
        accessibility: KeyAccessibility,
    ) -> Result<(), PlatformError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.set_item(name, value, accessibility).await
    }

    async fn delete_item(&self, name: &str) -> Result<(), PlatformError> {
        self.check()?;
        self.inner.delete_item(name).await
    }
}

#[allow(dead_code, reason = "not every test binary uses every helper")]
pub fn temp_root() -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("tierstore-test-{}", Uuid::new_v4()));
    path
}

#[allow(dead_code, reason = "not every test binary uses every helper")]
pub fn cleanup_storage(root: &Path) {
    let _ = std::fs::remove_dir_all(root);
}
