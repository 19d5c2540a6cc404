//! Keeps master data fresh across app lifecycle events

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::Result;
use crate::lifecycle::LifecycleHook;
use crate::session::SessionProvider;
use crate::storage::LocalStore;
use crate::sync::SyncScheduler;

/// Runs a TTL-gated sync on foreground and login; wipes per-account state on logout.
///
/// Logout clears the sync state first, which starts a new sync epoch, so a
/// run still in flight cannot write the old account's data back. The outbox
/// and ad hoc collections are left alone so queued timesheets and local
/// drafts survive.
pub struct SyncLifecycleHook {
    scheduler: Arc<SyncScheduler>,
    local_store: Arc<LocalStore>,
    session: Option<Arc<dyn SessionProvider>>,
    ttl: Duration,
}

impl SyncLifecycleHook {
    pub fn new(
        scheduler: Arc<SyncScheduler>,
        local_store: Arc<LocalStore>,
        session: Option<Arc<dyn SessionProvider>>,
        ttl: Duration,
    ) -> Self {
        Self {
            scheduler,
            local_store,
            session,
            ttl,
        }
    }

    async fn sync_if_due(&self) -> Result<()> {
        if let Some(run) = self.scheduler.sync_if_due(self.ttl).await? {
            info!("lifecycle sync: {}", run.summary());
        }
        Ok(())
    }
}

#[async_trait]
impl LifecycleHook for SyncLifecycleHook {
    async fn on_foreground(&self) -> Result<()> {
        self.sync_if_due().await
    }

    async fn on_login(&self) -> Result<()> {
        self.sync_if_due().await
    }

    async fn on_logout(&self) -> Result<()> {
        self.scheduler.clear_sync_state().await?;
        self.local_store.clear_synced_collections().await?;
        if let Some(session) = &self.session {
            session.clear().await?;
        }
        Ok(())
    }
}
