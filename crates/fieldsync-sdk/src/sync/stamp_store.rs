//! Persisted `last_successful_sync_at` and the sync epoch
//!
//! The epoch is bumped by every [`SyncStampStore::clear`]. A run remembers the
//! epoch it started in and discards its writes once the epoch has moved on,
//! so a logout during a run cannot be undone by that run.

use std::sync::Arc;

use crate::error::{FieldSyncError, Result};
use crate::storage::kv::{keys, KvStore};

/// Monotonic timestamp (ms) of the last globally successful sync run
#[derive(Debug, Clone)]
pub struct SyncStampStore {
    kv: Arc<KvStore>,
}

impl SyncStampStore {
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }

    pub async fn get(&self) -> Result<Option<i64>> {
        self.kv.get::<_, i64>(keys::LAST_SUCCESSFUL_SYNC_AT).await
    }

    /// Returns the stored value, which is `at` unless a newer one was already recorded
    pub async fn record(&self, at: i64) -> Result<i64> {
        self.kv.fetch_max_i64(keys::LAST_SUCCESSFUL_SYNC_AT, at).await
    }

    /// Like [`Self::record`], but only while `epoch` is still current.
    ///
    /// Returns `None` when the state was cleared in the meantime; a write that
    /// raced the clear is taken back.
    pub async fn record_in_epoch(&self, at: i64, epoch: i64) -> Result<Option<i64>> {
        if self.epoch().await? != epoch {
            return Ok(None);
        }
        let stored = self.record(at).await?;
        if self.epoch().await? != epoch {
            self.kv.remove_if_i64(keys::LAST_SUCCESSFUL_SYNC_AT, at).await?;
            return Ok(None);
        }
        Ok(Some(stored))
    }

    pub async fn epoch(&self) -> Result<i64> {
        Ok(self.kv.get::<_, i64>(keys::SYNC_EPOCH).await?.unwrap_or(0))
    }

    /// `Err(SyncReset)` once a clear happened after `epoch` was read
    pub async fn ensure_epoch(&self, epoch: i64) -> Result<()> {
        if self.epoch().await? != epoch {
            return Err(FieldSyncError::SyncReset);
        }
        Ok(())
    }

    /// Forget the timestamp and start a new epoch
    pub async fn clear(&self) -> Result<()> {
        self.kv.increment_i64(keys::SYNC_EPOCH).await?;
        self.kv.delete(keys::LAST_SUCCESSFUL_SYNC_AT).await
    }
}
