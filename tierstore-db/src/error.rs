//! Error types for the key-value engine.

use std::fmt;

/// Broad classification of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// The `SQLite` backend reported an error.
    Sqlite,
    /// Filesystem failure while preparing a partition.
    Io,
    /// Sealing or opening an encrypted value failed.
    Cipher,
    /// An internal lock was poisoned by a panicking thread.
    Poisoned,
}

impl fmt::Display for DbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Sqlite => "sqlite",
            Self::Io => "io",
            Self::Cipher => "cipher",
            Self::Poisoned => "poisoned",
        };
        f.write_str(label)
    }
}

/// Error returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbError {
    /// What failed.
    pub kind: DbErrorKind,
    /// Human-readable error message.
    pub message: String,
}

impl DbError {
    /// Creates a new engine error.
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn cipher(message: impl Into<String>) -> Self {
        Self::new(DbErrorKind::Cipher, message)
    }

    pub(crate) fn poisoned() -> Self {
        Self::new(DbErrorKind::Poisoned, "engine mutex poisoned")
    }

    /// Returns `true` when the failure came from value encryption.
    #[must_use]
    pub const fn is_cipher(&self) -> bool {
        matches!(self.kind, DbErrorKind::Cipher)
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl std::error::Error for DbError {}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        Self::new(DbErrorKind::Sqlite, err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        Self::new(DbErrorKind::Io, err.to_string())
    }
}

/// Result type for engine operations.
pub type DbResult<T> = Result<T, DbError>;
