//! Error types for the storage tiers.

use std::fmt;
use std::sync::Arc;

use strum::IntoStaticStr;
use thiserror::Error;
use tierstore_db::DbError;

use super::types::{Operation, Tier};

/// Underlying cause of a storage error. Shared so that one failed
/// initialization attempt can be reported to every caller that awaited it.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Where an error was raised: always one tier and one operation, plus the key
/// for key-addressed operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Tier the failing operation ran against.
    pub tier: Tier,
    /// Name of the failing operation.
    pub operation: Operation,
    /// Key being addressed, absent for whole-tier operations.
    pub key: Option<String>,
}

impl ErrorContext {
    /// Context for a whole-tier operation.
    #[must_use]
    pub const fn new(tier: Tier, operation: Operation) -> Self {
        Self {
            tier,
            operation,
            key: None,
        }
    }

    /// Context for a key-addressed operation.
    #[must_use]
    pub fn keyed(tier: Tier, operation: Operation, key: &str) -> Self {
        Self {
            tier,
            operation,
            key: Some(key.to_string()),
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tier, self.operation)?;
        if let Some(key) = &self.key {
            write!(f, " key={key}")?;
        }
        Ok(())
    }
}

/// Errors raised by the storage tiers and the manager.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum StorageError {
    /// Base kind of the taxonomy. Never raised by the tiers; reserved for
    /// hosts wrapping their own storage failures.
    #[error("storage error [{context}]: {message}")]
    Storage {
        /// Where the failure happened.
        context: ErrorContext,
        /// What went wrong.
        message: String,
        /// Underlying failure, if any.
        #[source]
        cause: Option<SharedError>,
    },

    /// The manager or the secure tier failed to come up. Retryable.
    #[error("storage initialization failed [{context}]: {message}")]
    Initialization {
        /// Where the failure happened.
        context: ErrorContext,
        /// What went wrong.
        message: String,
        /// Underlying failure, if any.
        #[source]
        cause: Option<SharedError>,
    },

    /// Key generation, retrieval, encryption or decryption failed.
    #[error("encryption error [{context}]: {message}")]
    Encryption {
        /// Where the failure happened.
        context: ErrorContext,
        /// What went wrong.
        message: String,
        /// Underlying failure, if any.
        #[source]
        cause: Option<SharedError>,
    },

    /// A value could not be turned into its stored form.
    #[error("serialization failed [{context}]: {cause}")]
    Serialization {
        /// Where the failure happened.
        context: ErrorContext,
        /// Serializer error.
        #[source]
        cause: SharedError,
    },

    /// Stored bytes could not be parsed back.
    #[error("deserialization failed [{context}], stored data may be corrupted: {cause}")]
    Deserialization {
        /// Where the failure happened.
        context: ErrorContext,
        /// Parser error.
        #[source]
        cause: SharedError,
    },

    /// The embedded engine failed to read, write or open.
    #[error("io error [{context}]: {cause}")]
    Io {
        /// Where the failure happened.
        context: ErrorContext,
        /// Engine error.
        #[source]
        cause: SharedError,
    },

    /// Storage was accessed before a successful initialization.
    #[error("storage not initialized")]
    NotInitialized,

    /// The requested feature is intentionally not implemented.
    #[error("not yet implemented [{context}]: {feature}")]
    Unimplemented {
        /// Where the call was made.
        context: ErrorContext,
        /// Name of the missing feature.
        feature: &'static str,
    },
}

/// Discriminant of [`StorageError`], named after the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum ErrorKind {
    /// Base storage error.
    #[strum(serialize = "StorageError")]
    Storage,
    /// Initialization failure.
    #[strum(serialize = "InitializationError")]
    Initialization,
    /// Key material or cipher failure.
    #[strum(serialize = "EncryptionError")]
    Encryption,
    /// Value could not be serialized.
    #[strum(serialize = "SerializationError")]
    Serialization,
    /// Stored bytes could not be parsed.
    #[strum(serialize = "DeserializationError")]
    Deserialization,
    /// Engine failure.
    #[strum(serialize = "IOError")]
    Io,
    /// Accessed before initialization.
    #[strum(serialize = "NotInitializedError")]
    NotInitialized,
    /// Feature not implemented.
    #[strum(serialize = "NotImplementedError")]
    Unimplemented,
}

impl StorageError {
    pub(crate) fn serialization(context: ErrorContext, cause: serde_json::Error) -> Self {
        Self::Serialization {
            context,
            cause: Arc::new(cause),
        }
    }

    pub(crate) fn deserialization(context: ErrorContext, cause: serde_json::Error) -> Self {
        Self::Deserialization {
            context,
            cause: Arc::new(cause),
        }
    }

    pub(crate) fn encryption(
        context: ErrorContext,
        message: impl Into<String>,
        cause: Option<SharedError>,
    ) -> Self {
        Self::Encryption {
            context,
            message: message.into(),
            cause,
        }
    }

    /// Maps an engine error: cipher failures become [`Self::Encryption`],
    /// everything else [`Self::Io`].
    pub(crate) fn from_db(context: ErrorContext, err: DbError) -> Self {
        if err.is_cipher() {
            Self::Encryption {
                context,
                message: err.message.clone(),
                cause: Some(Arc::new(err)),
            }
        } else {
            Self::Io {
                context,
                cause: Arc::new(err),
            }
        }
    }

    /// Wraps a failure that prevented storage from coming up.
    pub(crate) fn initialization(err: Self) -> Self {
        let tier = err.tier().unwrap_or(Tier::Secure);
        Self::Initialization {
            context: ErrorContext::new(tier, Operation::Initialize),
            message: err.to_string(),
            cause: Some(Arc::new(err)),
        }
    }

    /// Returns the taxonomy kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Initialization { .. } => ErrorKind::Initialization,
            Self::Encryption { .. } => ErrorKind::Encryption,
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::Deserialization { .. } => ErrorKind::Deserialization,
            Self::Io { .. } => ErrorKind::Io,
            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::Unimplemented { .. } => ErrorKind::Unimplemented,
        }
    }

    /// Returns the taxonomy name, e.g. `"SerializationError"`.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind().into()
    }

    /// Returns where the error was raised, if it is tier-bound.
    #[must_use]
    pub const fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Storage { context, .. }
            | Self::Initialization { context, .. }
            | Self::Encryption { context, .. }
            | Self::Serialization { context, .. }
            | Self::Deserialization { context, .. }
            | Self::Io { context, .. }
            | Self::Unimplemented { context, .. } => Some(context),
            Self::NotInitialized => None,
        }
    }

    /// Tier the error is tagged with.
    #[must_use]
    pub fn tier(&self) -> Option<Tier> {
        self.context().map(|context| context.tier)
    }

    /// Operation the error is tagged with.
    #[must_use]
    pub fn operation(&self) -> Option<Operation> {
        self.context().map(|context| context.operation)
    }

    /// Key the error is tagged with, for key-addressed operations.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.context().and_then(|context| context.key.as_deref())
    }

    /// Returns the wrapped storage error, e.g. the cause of an
    /// [`Self::Initialization`].
    #[must_use]
    pub fn inner(&self) -> Option<&Self> {
        match self {
            Self::Storage { cause, .. }
            | Self::Initialization { cause, .. }
            | Self::Encryption { cause, .. } => cause.as_deref()?.downcast_ref::<Self>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tierstore_db::DbErrorKind;

    #[test]
    fn test_db_error_mapping() {
        let context = ErrorContext::keyed(Tier::Secure, Operation::Get, "token");
        let io = StorageError::from_db(context.clone(), DbError::new(DbErrorKind::Sqlite, "disk"));
        assert_eq!(io.kind(), ErrorKind::Io);
        assert_eq!(io.name(), "IOError");

        let cipher = StorageError::from_db(context, DbError::new(DbErrorKind::Cipher, "bad tag"));
        assert_eq!(cipher.kind(), ErrorKind::Encryption);
        assert_eq!(cipher.tier(), Some(Tier::Secure));
        assert_eq!(cipher.operation(), Some(Operation::Get));
        assert_eq!(cipher.key(), Some("token"));
    }

    #[test]
    fn test_initialization_wraps_cause() {
        let cause = StorageError::encryption(
            ErrorContext::new(Tier::Secure, Operation::KeyRetrieval),
            "keychain locked",
            None,
        );
        let err = StorageError::initialization(cause);
        assert_eq!(err.name(), "InitializationError");
        assert_eq!(err.operation(), Some(Operation::Initialize));
        assert_eq!(err.key(), None);

        let inner = err.inner().expect("wrapped cause");
        assert_eq!(inner.kind(), ErrorKind::Encryption);
        assert_eq!(inner.operation(), Some(Operation::KeyRetrieval));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_host_wrapped_storage_error() {
        let cause = StorageError::from_db(
            ErrorContext::keyed(Tier::Cache, Operation::Set, "feed"),
            DbError::new(DbErrorKind::Sqlite, "disk full"),
        );
        let err = StorageError::Storage {
            context: ErrorContext::new(Tier::Cache, Operation::Set),
            message: "sync failed".to_string(),
            cause: Some(Arc::new(cause)),
        };
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.tier(), Some(Tier::Cache));
        assert_eq!(err.inner().map(StorageError::kind), Some(ErrorKind::Io));
        assert_eq!(err.clone().to_string(), err.to_string());
    }

    #[test]
    fn test_display_includes_context() {
        let err = StorageError::Unimplemented {
            context: ErrorContext::new(Tier::Secure, Operation::KeyRotation),
            feature: "encryption key rotation",
        };
        assert_eq!(
            err.to_string(),
            "not yet implemented [secure/key_rotation]: encryption key rotation"
        );
        assert!(StorageError::NotInitialized.context().is_none());
    }
}
