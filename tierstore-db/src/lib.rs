//! Embedded partitioned key-value engine.
//!
//! Every partition is an isolated string-to-string map. Partitions are opened
//! through an [`EngineProvider`], which decides where the data lives:
//!
//! * [`SqliteEngineProvider`]: one `SQLite` database file per partition, under
//!   either the backed-up data directory or the no-backup directory.
//! * [`MemoryEngineProvider`]: process-local maps, used by tests and by hosts
//!   that do not need durability.
//!
//! A partition opened with an encryption key is wrapped in an
//! [`EncryptedEngine`], which seals each value before it reaches the backend.
//! Consumer code only sees the [`KvEngine`] trait.

pub mod cipher;
mod engine;
pub mod error;
mod memory;
mod partition;
mod sqlite;

pub use cipher::EncryptedEngine;
pub use engine::{EngineProvider, KvEngine};
pub use error::{DbError, DbErrorKind, DbResult};
pub use memory::{MemoryEngine, MemoryEngineProvider};
pub use partition::{PartitionConfig, PartitionLocation};
pub use sqlite::{SqliteEngine, SqliteEngineProvider};
