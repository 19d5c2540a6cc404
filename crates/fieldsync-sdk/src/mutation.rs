//! Submit-or-enqueue policy for user writes
//!
//! A mutation is never silently dropped: it is either delivered, parked in the
//! outbox, or handed back to the caller as an error they must show.

use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{FieldSyncError, Result};
use crate::network::NetworkMonitor;
use crate::storage::{OutboxEntry, OutboxQueue};
use crate::sync::{ResourceApi, SubmitAck};

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The server accepted the mutation
    Delivered(SubmitAck),
    /// Connectivity or server trouble; the mutation waits in the outbox
    Queued(OutboxEntry),
}

impl SubmitOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

pub struct MutationGateway {
    api: Arc<dyn ResourceApi>,
    outbox: Arc<OutboxQueue>,
    monitor: Arc<NetworkMonitor>,
}

impl MutationGateway {
    pub fn new(
        api: Arc<dyn ResourceApi>,
        outbox: Arc<OutboxQueue>,
        monitor: Arc<NetworkMonitor>,
    ) -> Self {
        Self {
            api,
            outbox,
            monitor,
        }
    }

    /// Deliver `payload`, or queue it when delivery fails for a retryable reason.
    ///
    /// Errors:
    /// - `Rejected` (4xx): the server refused the content, nothing is queued
    /// - `OutboxUnavailable`: delivery failed and the mutation could not be saved either
    pub async fn submit(&self, kind: &str, key: &str, payload: Value) -> Result<SubmitOutcome> {
        if !self.monitor.is_online() {
            return self.enqueue(kind, key, payload, &FieldSyncError::Offline).await;
        }

        match self.api.submit(kind, &payload).await {
            Ok(ack) => {
                info!("📤 {} delivered (key={})", kind, key);
                Ok(SubmitOutcome::Delivered(ack))
            }
            Err(e) if e.is_retryable() => self.enqueue(kind, key, payload, &e).await,
            Err(e) => {
                warn!("{} rejected (key={}): {}", kind, key, e);
                Err(e)
            }
        }
    }

    async fn enqueue(
        &self,
        kind: &str,
        key: &str,
        payload: Value,
        cause: &FieldSyncError,
    ) -> Result<SubmitOutcome> {
        warn!("{} not delivered ({}), queuing in outbox", kind, cause);
        match self.outbox.enqueue(kind, key, payload).await {
            Ok(entry) => Ok(SubmitOutcome::Queued(entry)),
            Err(e) => {
                error!("❌ {} lost: outbox append failed after \"{}\": {}", kind, cause, e);
                Err(FieldSyncError::OutboxUnavailable(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::storage::SqliteStore;
    use crate::test_helpers::{online_monitor, FakeResourceApi};
    use serde_json::json;

    struct Fixture {
        api: Arc<FakeResourceApi>,
        sqlite: SqliteStore,
        outbox: Arc<OutboxQueue>,
        monitor: Arc<NetworkMonitor>,
        gateway: MutationGateway,
    }

    fn fixture() -> Fixture {
        let api = Arc::new(FakeResourceApi::new());
        let (_, monitor) = online_monitor();
        let sqlite = SqliteStore::open_in_memory().unwrap();
        let outbox = Arc::new(OutboxQueue::new(sqlite.clone()));
        let gateway = MutationGateway::new(api.clone(), outbox.clone(), monitor.clone());
        Fixture {
            api,
            sqlite,
            outbox,
            monitor,
            gateway,
        }
    }

    #[tokio::test]
    async fn delivered_when_online() {
        let f = fixture();
        let outcome = f
            .gateway
            .submit("timesheet", "ts-1", json!({"hours": 8}))
            .await
            .unwrap();
        assert!(outcome.is_delivered());
        assert_eq!(f.api.submitted().len(), 1);
        assert_eq!(f.outbox.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn offline_submit_goes_to_outbox() {
        let f = fixture();
        f.monitor.set_online(false);

        let payload = json!({"equipment": 3, "hours": 7.5});
        let outcome = f.gateway.submit("timesheet", "ts-2", payload.clone()).await.unwrap();
        let entry = match outcome {
            SubmitOutcome::Queued(entry) => entry,
            other => panic!("expected queued, got {:?}", other),
        };
        assert!(f.api.submitted().is_empty());

        let pending = f.outbox.list(Some("timesheet")).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, entry.id);
        assert_eq!(pending[0].key, "ts-2");
        assert_eq!(pending[0].payload, payload);
    }

    #[tokio::test]
    async fn transient_failures_are_queued() {
        let f = fixture();
        f.api.push_submit(Err(FieldSyncError::Timeout("30s".into())));
        f.api.push_submit(Err(FieldSyncError::from_status(502, "bad gateway")));

        for key in ["a", "b"] {
            let outcome = f.gateway.submit("timesheet", key, json!({})).await.unwrap();
            assert!(matches!(outcome, SubmitOutcome::Queued(_)));
        }
        assert_eq!(f.outbox.count(Some("timesheet")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rejection_is_surfaced_not_queued() {
        let f = fixture();
        f.api.push_submit(Err(FieldSyncError::from_status(422, "missing shift")));

        let err = f
            .gateway
            .submit("timesheet", "ts-3", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.class(), ErrorClass::Rejected);
        assert_eq!(f.outbox.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn outbox_failure_is_hard_error() {
        let f = fixture();
        f.monitor.set_online(false);
        f.sqlite
            .with_conn(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER disk_full BEFORE INSERT ON outbox_entry
                     BEGIN SELECT RAISE(ABORT, 'database or disk is full'); END;",
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = f
            .gateway
            .submit("timesheet", "ts-4", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, FieldSyncError::OutboxUnavailable(_)));
    }
}
