//! SQLite handle shared by the collection cache and the outbox

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{FieldSyncError, Result};
use crate::storage::migrate;

pub const DB_FILE_NAME: &str = "fieldsync.db";

/// SQLite store
///
/// One connection behind an async mutex; every multi-statement write runs in a
/// transaction while the lock is held, so readers only see committed snapshots.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open `{base_path}/fieldsync.db` and run migrations
    pub async fn open(base_path: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(base_path)
            .await
            .map_err(|e| FieldSyncError::IO(format!("failed to create data directory: {}", e)))?;
        let path = base_path.join(DB_FILE_NAME);

        let mut conn = Connection::open(&path)
            .map_err(|e| FieldSyncError::Storage(format!("failed to open database: {}", e)))?;
        migrate::init_db(&mut conn)?;

        tracing::info!("SQLite store ready: {}", path.display());
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, for tests and ephemeral sessions
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()
            .map_err(|e| FieldSyncError::Storage(format!("failed to open database: {}", e)))?;
        migrate::init_db(&mut conn)?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with exclusive access to the connection
    pub async fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R>,
    {
        let mut conn = self.conn.lock().await;
        f(&mut conn)
    }
}
