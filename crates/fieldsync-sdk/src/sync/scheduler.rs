//! TTL gating for full sync passes

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::Result;
use crate::sync::{ResourceSyncCoordinator, SyncRun, SyncStampStore};
use crate::utils::{format_millis, now_millis};

/// Default staleness window: one day
pub const DEFAULT_SYNC_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Decides whether a full pass is due and runs it.
///
/// The only state is `last_successful_sync_at`, advanced by the coordinator
/// after a globally successful pass and never moved backwards.
pub struct SyncScheduler {
    coordinator: Arc<ResourceSyncCoordinator>,
    stamps: SyncStampStore,
}

impl SyncScheduler {
    pub fn new(coordinator: Arc<ResourceSyncCoordinator>, stamps: SyncStampStore) -> Self {
        Self { coordinator, stamps }
    }

    pub async fn last_successful_sync_at(&self) -> Result<Option<i64>> {
        self.stamps.get().await
    }

    pub async fn is_sync_due(&self, ttl: Duration) -> Result<bool> {
        self.is_sync_due_at(ttl, now_millis()).await
    }

    /// Due iff never synced or strictly older than `ttl` at `now`
    pub async fn is_sync_due_at(&self, ttl: Duration, now: i64) -> Result<bool> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Ok(match self.stamps.get().await? {
            None => true,
            Some(last) => now.saturating_sub(last) > ttl_ms,
        })
    }

    /// Advance the timestamp to `at` unless a newer one is already stored
    pub async fn record_successful_sync(&self, at: i64) -> Result<()> {
        let stored = self.stamps.record(at).await?;
        debug!("last successful sync at {}", format_millis(stored));
        Ok(())
    }

    /// Full pass regardless of staleness
    pub async fn force_sync(&self) -> SyncRun {
        info!("🔄 forced sync");
        self.coordinator.sync_all().await
    }

    /// Full pass only when due; `None` when the cache is still fresh
    pub async fn sync_if_due(&self, ttl: Duration) -> Result<Option<SyncRun>> {
        if !self.is_sync_due(ttl).await? {
            debug!("sync not due (ttl {:?})", ttl);
            return Ok(None);
        }
        Ok(Some(self.coordinator.sync_all().await))
    }

    /// Forget the last successful sync (logout, account switch)
    pub async fn clear_sync_state(&self) -> Result<()> {
        self.stamps.clear().await?;
        info!("sync state cleared");
        Ok(())
    }
}
