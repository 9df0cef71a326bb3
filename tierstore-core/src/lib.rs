#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Tiered on-device key-value storage for mobile clients.
//!
//! Four isolated tiers share one embedded engine:
//!
//! - **preferences**: small durable settings, bare JSON values.
//! - **cache**: TTL envelopes, lazy expiry, oldest-write-first eviction.
//! - **secure**: values sealed under a per-installation key kept in the
//!   platform credential store.
//! - **temp**: session scratch data on a no-backup partition, wiped at startup.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tierstore_core::storage::{
//!     MemoryStorageProvider, StorageConfig, StorageContext,
//! };
//!
//! # async fn run() -> tierstore_core::storage::StorageResult<()> {
//! let context = StorageContext::new(
//!     Arc::new(MemoryStorageProvider::new()),
//!     StorageConfig::default(),
//! );
//! let storage = context.initialize_storage().await?;
//! storage.cache().set_with_ttl("feed", &vec![1, 2, 3], 300)?;
//! storage.secure().set_auth_token("token")?;
//! # Ok(())
//! # }
//! ```

pub mod logger;
pub mod storage;

pub use storage::{StorageContext, StorageError, StorageManager, StorageResult};

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("tierstore_core");
