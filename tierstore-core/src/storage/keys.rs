//! Encryption key provisioning for the secure tier.
//!
//! Provisioning runs at most once per [`KeyProvisioner`]:
//!
//! 1. Query the secure credential store for the key by its well-known name.
//! 2. If present, use it verbatim. An empty entry is deleted and treated as
//!    missing.
//! 3. Otherwise generate 32 random bytes and base64-encode them.
//! 4. Persist the new key, device-only and readable while unlocked.
//!
//! Concurrent callers share the in-flight attempt. A failed attempt leaves
//! nothing cached, so the next call starts over.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::FutureExt;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use super::attempt::SharedAttempt;
use super::config::KeyFallbackPolicy;
use super::error::{ErrorContext, StorageError, StorageResult};
use super::traits::{KeyAccessibility, PlatformError, RandomSource, SecureCredentialStore};
use super::types::{Operation, Tier};

/// Length of the raw key material in bytes.
pub const ENCRYPTION_KEY_BYTES: usize = 32;

/// Where the active encryption key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Read from the secure credential store.
    Stored,
    /// Generated on this run and persisted to the secure credential store.
    Generated,
    /// Generated on this run and kept only in memory.
    Ephemeral,
}

/// The secure tier's encryption key.
pub struct EncryptionKey {
    secret: SecretString,
    origin: KeyOrigin,
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl EncryptionKey {
    /// Returns where the key came from.
    #[must_use]
    pub const fn origin(&self) -> KeyOrigin {
        self.origin
    }

    /// Returns `true` if data sealed under this key will not survive a restart.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.origin == KeyOrigin::Ephemeral
    }

    /// Returns an owned copy of the key material for opening a partition.
    pub(crate) fn to_secret(&self) -> SecretString {
        SecretString::from(self.secret.expose_secret().to_string())
    }
}

/// Provisions the secure tier's encryption key against the platform stores.
pub struct KeyProvisioner {
    source: Arc<KeySource>,
    key: SharedAttempt<EncryptionKey>,
}

struct KeySource {
    credentials: Arc<dyn SecureCredentialStore>,
    random: Arc<dyn RandomSource>,
    key_name: String,
    fallback: KeyFallbackPolicy,
}

impl std::fmt::Debug for KeyProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyProvisioner")
            .field("key_name", &self.source.key_name)
            .field("fallback", &self.source.fallback)
            .field("provisioned", &self.key.is_ready())
            .finish_non_exhaustive()
    }
}

impl KeyProvisioner {
    /// Creates a provisioner for the key named `key_name`.
    pub fn new(
        credentials: Arc<dyn SecureCredentialStore>,
        random: Arc<dyn RandomSource>,
        key_name: impl Into<String>,
        fallback: KeyFallbackPolicy,
    ) -> Self {
        Self {
            source: Arc::new(KeySource {
                credentials,
                random,
                key_name: key_name.into(),
                fallback,
            }),
            key: SharedAttempt::new(),
        }
    }

    /// Returns `true` once a key has been provisioned.
    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        self.key.is_ready()
    }

    /// Returns the encryption key, provisioning it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Encryption`] tagged `key_retrieval`,
    /// `key_generation` or `key_storage` depending on the failing step.
    /// Callers that joined a failed attempt all receive its error.
    pub async fn encryption_key(&self) -> StorageResult<Arc<EncryptionKey>> {
        let source = Arc::clone(&self.source);
        self.key
            .get_or_try_init(move || async move { source.provision().await }.boxed())
            .await
    }
}

impl KeySource {
    async fn provision(&self) -> StorageResult<Arc<EncryptionKey>> {
        match self.load_or_create().await {
            Ok(key) => Ok(Arc::new(key)),
            Err(err)
                if self.fallback == KeyFallbackPolicy::EphemeralKey
                    && err.operation() != Some(Operation::KeyGeneration) =>
            {
                log::error!(
                    "secure credential store unavailable ({err}); opening the secure tier \
                     with an ephemeral key, secure data written now will not survive a restart"
                );
                let secret = self.generate().await?;
                Ok(Arc::new(EncryptionKey {
                    secret,
                    origin: KeyOrigin::Ephemeral,
                }))
            }
            Err(err) => Err(err),
        }
    }

    async fn load_or_create(&self) -> StorageResult<EncryptionKey> {
        let existing = self
            .credentials
            .get_item(&self.key_name)
            .await
            .map_err(|err| {
                key_error(
                    Operation::KeyRetrieval,
                    "failed to read the encryption key from the secure credential store",
                    err,
                )
            })?;
        match existing {
            Some(encoded) if !encoded.is_empty() => {
                return Ok(EncryptionKey {
                    secret: SecretString::from(encoded),
                    origin: KeyOrigin::Stored,
                });
            }
            Some(_) => {
                log::warn!("stored encryption key is empty; replacing it");
                self.credentials
                    .delete_item(&self.key_name)
                    .await
                    .map_err(|err| {
                        key_error(
                            Operation::KeyStorage,
                            "failed to remove the empty encryption key entry",
                            err,
                        )
                    })?;
            }
            None => {}
        }

        let secret = self.generate().await?;
        self.credentials
            .set_item(
                &self.key_name,
                secret.expose_secret(),
                KeyAccessibility::WhenUnlockedThisDeviceOnly,
            )
            .await
            .map_err(|err| {
                key_error(
                    Operation::KeyStorage,
                    "failed to persist the encryption key to the secure credential store",
                    err,
                )
            })?;
        log::info!("generated a new storage encryption key");
        Ok(EncryptionKey {
            secret,
            origin: KeyOrigin::Generated,
        })
    }

    async fn generate(&self) -> StorageResult<SecretString> {
        let bytes = Zeroizing::new(
            self.random
                .random_bytes(ENCRYPTION_KEY_BYTES)
                .await
                .map_err(|err| {
                    key_error(
                        Operation::KeyGeneration,
                        "secure random source failed",
                        err,
                    )
                })?,
        );
        if bytes.len() != ENCRYPTION_KEY_BYTES {
            return Err(StorageError::encryption(
                ErrorContext::new(Tier::Secure, Operation::KeyGeneration),
                format!(
                    "random source returned {} bytes, expected {ENCRYPTION_KEY_BYTES}",
                    bytes.len()
                ),
                None,
            ));
        }
        Ok(SecretString::from(STANDARD.encode(bytes.as_slice())))
    }
}

fn key_error(operation: Operation, message: &str, err: PlatformError) -> StorageError {
    StorageError::encryption(
        ErrorContext::new(Tier::Secure, operation),
        message,
        Some(Arc::new(err)),
    )
}
