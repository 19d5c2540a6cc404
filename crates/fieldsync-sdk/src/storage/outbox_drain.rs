//! Outbox replay
//!
//! Nothing is replayed implicitly. Callers either run [`OutboxDrainer::drain_once`]
//! themselves or opt into [`OutboxDrainer::spawn_on_reconnect`].
//!
//! An entry the server rejected would be rejected again, so the drainer holds
//! it back on later passes until [`OutboxDrainer::release_rejected`] is called
//! (after the user fixed the data, for example). Held entries stay queued.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FieldSyncError, Result};
use crate::network::NetworkMonitor;
use crate::storage::{OutboxQueue, RetryPolicy};
use crate::sync::ResourceApi;

/// Result of one replay pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Ids delivered and removed, in replay order
    pub delivered: Vec<String>,
    /// Ids the server refused in this pass; they stay queued for manual inspection
    pub rejected: Vec<String>,
    /// Ids refused in an earlier pass and not submitted again
    pub held: Vec<String>,
    /// Set when the pass stopped early on a transient failure
    pub interrupted: Option<String>,
}

impl DrainReport {
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

pub struct OutboxDrainer {
    api: Arc<dyn ResourceApi>,
    outbox: Arc<OutboxQueue>,
    monitor: Arc<NetworkMonitor>,
    policy: RetryPolicy,
    rejected: Mutex<HashSet<String>>,
}

impl OutboxDrainer {
    pub fn new(
        api: Arc<dyn ResourceApi>,
        outbox: Arc<OutboxQueue>,
        monitor: Arc<NetworkMonitor>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            api,
            outbox,
            monitor,
            policy,
            rejected: Mutex::new(HashSet::new()),
        }
    }

    /// Let held entries be submitted again by the next pass
    pub fn release_rejected(&self) {
        self.rejected.lock().clear();
    }

    /// Replay pending entries (optionally of one kind) in enqueue order.
    ///
    /// Only local storage errors are returned as `Err`; remote failures end up
    /// in the report.
    pub async fn drain_once(&self, kind: Option<&str>) -> Result<DrainReport> {
        let (report, _) = self.drain_pass(kind).await?;
        Ok(report)
    }

    async fn drain_pass(&self, kind: Option<&str>) -> Result<(DrainReport, Option<FieldSyncError>)> {
        let mut report = DrainReport::default();
        if !self.monitor.is_online() {
            report.interrupted = Some(FieldSyncError::Offline.to_string());
            return Ok((report, Some(FieldSyncError::Offline)));
        }

        let entries = self.outbox.list(kind).await?;
        if entries.is_empty() {
            return Ok((report, None));
        }
        info!("📤 draining outbox: {} entries", entries.len());

        for entry in entries {
            if self.rejected.lock().contains(&entry.id) {
                report.held.push(entry.id);
                continue;
            }
            match self.api.submit(&entry.kind, &entry.payload).await {
                Ok(_) => {
                    self.outbox.remove(&entry.id).await?;
                    report.delivered.push(entry.id);
                }
                Err(e) if e.is_retryable() => {
                    // later entries wait so the server sees them in order
                    warn!("outbox drain stopped at {}: {}", entry.id, e);
                    report.interrupted = Some(e.to_string());
                    return Ok((report, Some(e)));
                }
                Err(e) => {
                    warn!("outbox entry {} ({}) rejected, held in queue: {}", entry.id, entry.kind, e);
                    self.rejected.lock().insert(entry.id.clone());
                    report.rejected.push(entry.id);
                }
            }
        }

        info!(
            "outbox drained: {} delivered, {} rejected, {} held",
            report.delivered.len(),
            report.rejected.len(),
            report.held.len()
        );
        Ok((report, None))
    }

    /// Drain after every offline -> online transition until `cancel` fires.
    ///
    /// Transient failures are retried with the configured backoff while the
    /// device stays online.
    pub fn spawn_on_reconnect(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let mut receiver = self.monitor.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = receiver.recv() => match event {
                        Ok(event) if !event.was_online && event.is_online => {
                            self.drain_with_retry(&cancel).await;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!("drain worker lagged, {} events skipped", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!("outbox drain worker stopped");
        })
    }

    async fn drain_with_retry(&self, cancel: &CancellationToken) {
        let mut attempt = 0u32;
        loop {
            let error = match self.drain_pass(None).await {
                Ok((_, None)) => return,
                Ok((_, Some(e))) => e,
                Err(e) => {
                    warn!("outbox drain aborted, local storage failed: {}", e);
                    return;
                }
            };
            if !self.policy.should_retry(attempt, &error) {
                warn!("outbox drain giving up after {} attempts: {}", attempt + 1, error);
                return;
            }
            let delay = self.policy.delay_for(attempt, &error);
            debug!("outbox drain retry {} in {:?}", attempt + 1, delay);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if !self.monitor.is_online() {
                // the next reconnect starts over
                return;
            }
            attempt += 1;
        }
    }
}
