//! Outbox of mutations that could not reach the remote service
//!
//! Append-only from the writer's side: entries are created once and only ever
//! removed whole. Enqueue touches local storage only, so it works offline.

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::Result;
use crate::storage::dao::OutboxDao;
use crate::storage::entities::OutboxEntry;
use crate::storage::sqlite::SqliteStore;
use crate::utils::now_millis;

#[derive(Debug, Clone)]
pub struct OutboxQueue {
    sqlite: SqliteStore,
}

impl OutboxQueue {
    pub fn new(sqlite: SqliteStore) -> Self {
        Self { sqlite }
    }

    /// Append a pending mutation. Duplicate keys are accepted.
    pub async fn enqueue(&self, kind: &str, key: &str, payload: Value) -> Result<OutboxEntry> {
        let entry = OutboxEntry {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            key: key.to_string(),
            payload,
            enqueued_at: now_millis(),
        };
        self.sqlite
            .with_conn(|conn| OutboxDao::new(conn).insert(&entry))
            .await?;
        info!("📥 outbox: queued {} (key={}, id={})", entry.kind, entry.key, entry.id);
        Ok(entry)
    }

    /// Pending entries in enqueue order
    pub async fn list(&self, kind: Option<&str>) -> Result<Vec<OutboxEntry>> {
        self.sqlite
            .with_conn(|conn| OutboxDao::new(conn).list(kind))
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<OutboxEntry>> {
        self.sqlite.with_conn(|conn| OutboxDao::new(conn).get(id)).await
    }

    /// Remove an entry after it was replayed. Removing an unknown id is not an error.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let removed = self
            .sqlite
            .with_conn(|conn| OutboxDao::new(conn).delete(id))
            .await?;
        if removed {
            debug!("outbox: removed {}", id);
        }
        Ok(())
    }

    pub async fn count(&self, kind: Option<&str>) -> Result<usize> {
        self.sqlite
            .with_conn(|conn| OutboxDao::new(conn).count(kind))
            .await
    }
}

/// Dedup key derived from the mutation itself, for callers without a natural key
pub fn content_key(kind: &str, payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    // serde_json::Value keeps object keys sorted, so equal payloads hash equally
    hasher.update(payload.to_string().as_bytes());
    format!("{}:{}", kind, hex::encode(&hasher.finalize()[..16]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn queue_at(dir: &TempDir) -> OutboxQueue {
        OutboxQueue::new(SqliteStore::open(dir.path()).await.unwrap())
    }

    #[tokio::test]
    async fn enqueue_list_in_fifo_order() {
        let queue = OutboxQueue::new(SqliteStore::open_in_memory().unwrap());
        let a = queue.enqueue("timesheet", "ts-1", json!({"hours": 8})).await.unwrap();
        let b = queue.enqueue("photo", "p-1", json!({"uri": "x"})).await.unwrap();
        let c = queue.enqueue("timesheet", "ts-2", json!({"hours": 4})).await.unwrap();

        let all = queue.list(None).await.unwrap();
        assert_eq!(all.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec![a.id.as_str(), b.id.as_str(), c.id.as_str()]);

        let timesheets = queue.list(Some("timesheet")).await.unwrap();
        assert_eq!(timesheets, vec![a, c]);
        assert_eq!(queue.count(Some("photo")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicates_are_accepted() {
        let queue = OutboxQueue::new(SqliteStore::open_in_memory().unwrap());
        let first = queue.enqueue("timesheet", "same", json!({"n": 1})).await.unwrap();
        let second = queue.enqueue("timesheet", "same", json!({"n": 1})).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(queue.count(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn entries_survive_restart_and_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let entry = {
            let queue = queue_at(&dir).await;
            queue.enqueue("timesheet", "ts-9", json!({"operator": 3})).await.unwrap()
        };

        let queue = queue_at(&dir).await;
        let listed = queue.list(None).await.unwrap();
        assert_eq!(listed, vec![entry.clone()]);
        assert_eq!(queue.get(&entry.id).await.unwrap(), Some(entry.clone()));

        queue.remove(&entry.id).await.unwrap();
        queue.remove(&entry.id).await.unwrap();
        assert!(queue.list(None).await.unwrap().is_empty());

        let queue = queue_at(&dir).await;
        assert!(queue.list(None).await.unwrap().is_empty());
    }

    #[test]
    fn content_key_is_stable() {
        let a = content_key("timesheet", &json!({"b": 1, "a": 2}));
        let b = content_key("timesheet", &json!({"a": 2, "b": 1}));
        assert_eq!(a, b);
        assert!(a.starts_with("timesheet:"));
        assert_ne!(a, content_key("timesheet", &json!({"a": 3})));
        assert_ne!(a, content_key("photo", &json!({"b": 1, "a": 2})));
    }
}
