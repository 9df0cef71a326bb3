//! Secure tier: secrets sealed under the installation encryption key.
//!
//! The partition is opened with the key provisioned by
//! [`KeyProvisioner`](super::KeyProvisioner). Once open it behaves like any
//! other tier; reads under a wrong key fail with
//! [`StorageError::Encryption`] instead of returning garbage.
//!
//! An ephemeral fallback key never touches the persisted partition's values.
//! The tier then reads and writes a memory-only partition, and the persisted
//! one stays sealed under the stored key. It still counts toward the tier
//! size and is wiped by [`TierStore::clear`] and
//! [`SecureStorage::clear_auth`].

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tierstore_db::{EngineProvider, MemoryEngineProvider};

use super::adapter::{StorageAdapter, TierStore};
use super::error::{ErrorContext, StorageError, StorageResult};
use super::keys::{EncryptionKey, KeyOrigin};
use super::types::{Operation, Tier};

const KEY_AUTH_TOKEN: &str = "auth_token";
const KEY_REFRESH_TOKEN: &str = "refresh_token";
const KEY_USER_CREDENTIALS: &str = "user_credentials";
const API_KEY_PREFIX: &str = "api_key_";

const AUTH_KEYS: [&str; 3] = [KEY_AUTH_TOKEN, KEY_REFRESH_TOKEN, KEY_USER_CREDENTIALS];

/// A username and password pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Encrypted storage for tokens, API keys and credentials.
#[derive(Debug)]
pub struct SecureStorage {
    adapter: StorageAdapter,
    /// Persisted partition, opened without a key, while on an ephemeral key.
    sealed: Option<StorageAdapter>,
    key_origin: KeyOrigin,
}

impl TierStore for SecureStorage {
    fn adapter(&self) -> &StorageAdapter {
        &self.adapter
    }

    fn clear(&self) -> StorageResult<()> {
        if let Some(sealed) = &self.sealed {
            sealed.clear()?;
        }
        self.adapter.clear()
    }

    fn size(&self) -> StorageResult<u64> {
        let sealed = match &self.sealed {
            Some(sealed) => sealed.size()?,
            None => 0,
        };
        Ok(self.adapter.size()?.saturating_add(sealed))
    }
}

impl SecureStorage {
    pub(crate) fn open(engines: &dyn EngineProvider, key: &EncryptionKey) -> StorageResult<Self> {
        if key.is_ephemeral() {
            return Ok(Self {
                adapter: StorageAdapter::open(
                    Tier::Secure,
                    &MemoryEngineProvider::new(),
                    Some(key.to_secret()),
                )?,
                sealed: Some(StorageAdapter::open(Tier::Secure, engines, None)?),
                key_origin: key.origin(),
            });
        }
        Ok(Self {
            adapter: StorageAdapter::open(Tier::Secure, engines, Some(key.to_secret()))?,
            sealed: None,
            key_origin: key.origin(),
        })
    }

    /// Where the key this tier was opened with came from.
    #[must_use]
    pub const fn key_origin(&self) -> KeyOrigin {
        self.key_origin
    }

    /// Returns `true` if the tier runs on an in-memory fallback key; anything
    /// written is gone after a restart.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.key_origin == KeyOrigin::Ephemeral
    }

    /// Stores a secret value. Same as [`TierStore::set`].
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, encryption or the write fails.
    pub fn set_secure<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        self.set(key, value)
    }

    /// Reads a secret value. Same as [`TierStore::get`].
    ///
    /// # Errors
    ///
    /// Returns an error if the read or decryption fails or the value is corrupt.
    pub fn get_secure<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        self.get(key)
    }

    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_auth_token(&self, token: &str) -> StorageResult<()> {
        self.set(KEY_AUTH_TOKEN, token)
    }

    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn auth_token(&self) -> StorageResult<Option<String>> {
        self.get(KEY_AUTH_TOKEN)
    }

    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_refresh_token(&self, token: &str) -> StorageResult<()> {
        self.set(KEY_REFRESH_TOKEN, token)
    }

    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.get(KEY_REFRESH_TOKEN)
    }

    /// Stores the API key for `service`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_api_key(&self, service: &str, api_key: &str) -> StorageResult<()> {
        self.set(&api_key_name(service), api_key)
    }

    /// Returns the API key for `service`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn api_key(&self, service: &str) -> StorageResult<Option<String>> {
        self.get(&api_key_name(service))
    }

    /// Deletes the API key for `service`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn remove_api_key(&self, service: &str) -> StorageResult<()> {
        self.delete(&api_key_name(service))
    }

    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_credentials(&self, credentials: &Credentials) -> StorageResult<()> {
        self.set(KEY_USER_CREDENTIALS, credentials)
    }

    /// # Errors
    ///
    /// Returns an error if the read fails or the stored pair is corrupt.
    pub fn credentials(&self) -> StorageResult<Option<Credentials>> {
        self.get(KEY_USER_CREDENTIALS)
    }

    /// Deletes tokens, credentials and every API key. Other secure keys are
    /// left in place. Returns the number of keys removed.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or deleting fails.
    pub fn clear_auth(&self) -> StorageResult<usize> {
        let is_auth = |key: &str| AUTH_KEYS.contains(&key) || key.starts_with(API_KEY_PREFIX);
        let mut removed = self.adapter.delete_where(is_auth)?;
        if let Some(sealed) = &self.sealed {
            removed += sealed.delete_where(is_auth)?;
        }
        Ok(removed)
    }

    /// Re-encrypts the tier under a new key. Not implemented.
    ///
    /// # Errors
    ///
    /// Always returns [`StorageError::Unimplemented`].
    pub fn rotate_encryption_key(&self) -> StorageResult<()> {
        Err(StorageError::Unimplemented {
            context: ErrorContext::new(Tier::Secure, Operation::KeyRotation),
            feature: "encryption key rotation",
        })
    }
}

fn api_key_name(service: &str) -> String {
    format!("{API_KEY_PREFIX}{service}")
}
