//! Partition descriptors.

use secrecy::SecretString;

/// Where a partition's data is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionLocation {
    /// Durable application data, included in device backups.
    Backed,
    /// Durable for the install but excluded from device backups.
    NoBackup,
}

/// Describes a partition to open.
#[derive(Debug)]
pub struct PartitionConfig {
    /// Partition identity; selects the database file or in-memory map.
    pub name: String,
    /// Backup class of the partition.
    pub location: PartitionLocation,
    /// Key material for value encryption. `None` stores values in the clear.
    pub encryption_key: Option<SecretString>,
}

impl PartitionConfig {
    /// Describes an unencrypted partition.
    #[must_use]
    pub fn new(name: impl Into<String>, location: PartitionLocation) -> Self {
        Self {
            name: name.into(),
            location,
            encryption_key: None,
        }
    }

    /// Sets the encryption key for the partition.
    #[must_use]
    pub fn with_encryption_key(mut self, key: SecretString) -> Self {
        self.encryption_key = Some(key);
        self
    }
}
