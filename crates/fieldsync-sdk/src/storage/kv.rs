//! KV store on sled
//!
//! Holds small scalars that must survive restarts: the last successful sync
//! timestamp and the cached session token. Values are JSON encoded.

use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::path::{Path, PathBuf};
use crate::error::{FieldSyncError, Result};

const DEFAULT_TREE: &str = "fieldsync";

/// KV store
#[derive(Debug)]
pub struct KvStore {
    path: PathBuf,
    // keeps the database open for the lifetime of the tree handle
    _db: Db,
    tree: Tree,
}

impl KvStore {
    /// Open (or create) the store under `{base_path}/kv`
    pub async fn new(base_path: &Path) -> Result<Self> {
        let kv_path = base_path.join("kv");
        tokio::fs::create_dir_all(&kv_path)
            .await
            .map_err(|e| FieldSyncError::IO(format!("failed to create KV directory: {}", e)))?;

        // a previous handle in the same process may still hold the file lock
        const MAX_OPEN_RETRIES: u32 = 6;
        const RETRY_DELAY_MS: u64 = 100;
        let mut last_err: Option<sled::Error> = None;
        let mut db_opt: Option<Db> = None;
        for attempt in 0..MAX_OPEN_RETRIES {
            match sled::open(&kv_path) {
                Ok(d) => {
                    db_opt = Some(d);
                    break;
                }
                Err(e) => {
                    let msg = e.to_string();
                    last_err = Some(e);
                    let is_lock = msg.contains("could not acquire lock")
                        || msg.contains("Resource temporarily unavailable")
                        || msg.contains("WouldBlock");
                    if is_lock && attempt + 1 < MAX_OPEN_RETRIES {
                        let delay_ms = RETRY_DELAY_MS * (1 << attempt);
                        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                    } else {
                        break;
                    }
                }
            }
        }
        let db = db_opt.ok_or_else(|| {
            FieldSyncError::KvStore(
                last_err
                    .map(|e| format!("failed to open sled database: {}", e))
                    .unwrap_or_else(|| "failed to open sled database".to_string()),
            )
        })?;
        let tree = db
            .open_tree(DEFAULT_TREE)
            .map_err(|e| FieldSyncError::KvStore(format!("failed to open tree: {}", e)))?;

        tracing::debug!("KV store opened at {}", kv_path.display());
        Ok(Self { path: kv_path, _db: db, tree })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn set<K, V>(&self, key: K, value: &V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: Serialize,
    {
        let value_bytes = serde_json::to_vec(value)
            .map_err(|e| FieldSyncError::Serialization(format!("failed to encode value: {}", e)))?;
        self.tree
            .insert(key, value_bytes)
            .map_err(|e| FieldSyncError::KvStore(format!("set failed: {}", e)))?;
        self.flush().await
    }

    pub async fn get<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: AsRef<[u8]>,
        V: for<'de> Deserialize<'de>,
    {
        let result = self
            .tree
            .get(key)
            .map_err(|e| FieldSyncError::KvStore(format!("get failed: {}", e)))?;
        match result {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|e| {
                    FieldSyncError::Serialization(format!("failed to decode value: {}", e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub async fn delete<K>(&self, key: K) -> Result<()>
    where
        K: AsRef<[u8]>,
    {
        self.tree
            .remove(key)
            .map_err(|e| FieldSyncError::KvStore(format!("delete failed: {}", e)))?;
        self.flush().await
    }

    pub async fn exists<K>(&self, key: K) -> Result<bool>
    where
        K: AsRef<[u8]>,
    {
        self.tree
            .contains_key(key)
            .map_err(|e| FieldSyncError::KvStore(format!("exists failed: {}", e)))
    }

    /// Raise an i64 stored under `key` to at least `candidate`.
    ///
    /// Returns the value stored afterwards. Concurrent callers converge on the
    /// maximum whatever the interleaving.
    pub async fn fetch_max_i64(&self, key: &str, candidate: i64) -> Result<i64> {
        self.update_i64(key, |current| match current {
            Some(current) if current >= candidate => None,
            _ => Some(candidate),
        })
        .await
    }

    /// Atomically add one to the i64 under `key` (missing counts as 0)
    pub async fn increment_i64(&self, key: &str) -> Result<i64> {
        self.update_i64(key, |current| Some(current.unwrap_or(0) + 1))
            .await
    }

    /// Remove `key` only while it still holds `expected`
    pub async fn remove_if_i64(&self, key: &str, expected: i64) -> Result<bool> {
        let expected_bytes = serde_json::to_vec(&expected)?;
        let swapped = self
            .tree
            .compare_and_swap(key, Some(expected_bytes), None as Option<Vec<u8>>)
            .map_err(|e| FieldSyncError::KvStore(format!("compare_and_swap failed: {}", e)))?;
        if swapped.is_err() {
            return Ok(false);
        }
        self.flush().await?;
        Ok(true)
    }

    /// CAS loop: `next` maps the current value to the one to store, `None`
    /// keeps the current value. Returns the value stored afterwards.
    async fn update_i64<F>(&self, key: &str, next: F) -> Result<i64>
    where
        F: Fn(Option<i64>) -> Option<i64>,
    {
        loop {
            let current_bytes = self
                .tree
                .get(key)
                .map_err(|e| FieldSyncError::KvStore(format!("failed to read {}: {}", key, e)))?;
            let current: Option<i64> = match &current_bytes {
                Some(bytes) => Some(serde_json::from_slice(bytes).map_err(|e| {
                    FieldSyncError::Serialization(format!("{} is not an integer: {}", key, e))
                })?),
                None => None,
            };
            let Some(value) = next(current) else {
                return Ok(current.unwrap_or_default());
            };

            let new_bytes = serde_json::to_vec(&value)?;
            let swapped = self
                .tree
                .compare_and_swap(key, current_bytes, Some(new_bytes))
                .map_err(|e| FieldSyncError::KvStore(format!("compare_and_swap failed: {}", e)))?;
            match swapped {
                Ok(()) => {
                    self.flush().await?;
                    return Ok(value);
                }
                // lost the race, re-read
                Err(_) => continue,
            }
        }
    }

    async fn flush(&self) -> Result<()> {
        self.tree
            .flush_async()
            .await
            .map_err(|e| FieldSyncError::KvStore(format!("flush failed: {}", e)))?;
        Ok(())
    }
}

/// Well-known keys
pub mod keys {
    pub const LAST_SUCCESSFUL_SYNC_AT: &str = "sync:last_successful_sync_at";
    pub const SYNC_EPOCH: &str = "sync:epoch";
    pub const SESSION_TOKEN: &str = "session:access_token";
}
