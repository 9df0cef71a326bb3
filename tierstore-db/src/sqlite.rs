//! Durable engine on `SQLite`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use crate::cipher::EncryptedEngine;
use crate::engine::{EngineProvider, KvEngine};
use crate::error::{DbError, DbResult};
use crate::partition::{PartitionConfig, PartitionLocation};

const PARTITION_FILE_SUFFIX: &str = "kv.sqlite";

/// A partition stored in its own `SQLite` database.
///
/// The connection is `Mutex`-guarded; all access is serialized.
pub struct SqliteEngine {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteEngine").finish_non_exhaustive()
    }
}

impl SqliteEngine {
    /// Opens (or creates) the database at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        configure_connection(&conn)?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> DbResult<T> {
        let conn = self.conn.lock().map_err(|_| DbError::poisoned())?;
        Ok(f(&conn)?)
    }
}

fn configure_connection(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

fn ensure_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key    TEXT PRIMARY KEY NOT NULL,
            value  TEXT NOT NULL
        ) WITHOUT ROWID;",
    )?;
    Ok(())
}

impl KvEngine for SqliteEngine {
    fn get_string(&self, key: &str) -> DbResult<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    fn set_string(&self, key: &str, value: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
        })?;
        Ok(())
    }

    fn delete(&self, key: &str) -> DbResult<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM kv WHERE key = ?1", params![key]))?;
        Ok(())
    }

    fn clear_all(&self) -> DbResult<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM kv", []))?;
        Ok(())
    }

    fn all_keys(&self) -> DbResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(keys)
        })
    }

    fn contains(&self, key: &str) -> DbResult<bool> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM kv WHERE key = ?1)",
                params![key],
                |row| row.get(0),
            )
        })
    }

    fn stored_size(&self, key: &str) -> DbResult<Option<u64>> {
        let len: Option<i64> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT length(CAST(value AS BLOB)) FROM kv WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })?;
        Ok(len.map(|len| u64::try_from(len).unwrap_or(0)))
    }
}

/// Opens each partition as `<dir>/<name>.kv.sqlite`.
#[derive(Debug, Clone)]
pub struct SqliteEngineProvider {
    data_dir: PathBuf,
    no_backup_dir: PathBuf,
}

impl SqliteEngineProvider {
    /// Creates a provider rooted at the given directories.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>, no_backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            no_backup_dir: no_backup_dir.into(),
        }
    }

    /// Returns the database path used for `config`.
    #[must_use]
    pub fn partition_path(&self, config: &PartitionConfig) -> PathBuf {
        let dir = match config.location {
            PartitionLocation::Backed => &self.data_dir,
            PartitionLocation::NoBackup => &self.no_backup_dir,
        };
        dir.join(format!("{}.{PARTITION_FILE_SUFFIX}", config.name))
    }
}

impl EngineProvider for SqliteEngineProvider {
    fn open(&self, config: &PartitionConfig) -> DbResult<Arc<dyn KvEngine>> {
        let backend: Arc<dyn KvEngine> =
            Arc::new(SqliteEngine::open(&self.partition_path(config))?);
        match &config.encryption_key {
            Some(key) => Ok(Arc::new(EncryptedEngine::new(backend, key, &config.name)?)),
            None => Ok(backend),
        }
    }
}
