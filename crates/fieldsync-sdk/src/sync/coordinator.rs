//! Resource sync coordinator
//!
//! One pass fetches every configured resource type and replaces its cached
//! collection. A failing type is recorded and skipped; it never aborts the
//! pass or touches another type's collection.
//!
//! ## NOTE: the coordinator does not retry
//!
//! Staleness gating lives in [`crate::sync::SyncScheduler`]; outbox replay
//! lives in [`crate::storage::OutboxDrainer`]. A failed type simply keeps its
//! previous snapshot until the next pass.
//!
//! A pass is bound to the sync epoch it started in (see
//! [`crate::sync::SyncStampStore`]). Once the epoch moves on, every later write
//! of that pass is dropped and the pass does not count as successful.

use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ErrorClass, FieldSyncError, Result};
use crate::network::NetworkMonitor;
use crate::storage::{LocalStore, ResourceRecord};
use crate::sync::{ResourceApi, ResourceType, SyncStampStore};
use crate::utils::now_millis;

/// How the types of one pass are fetched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// One type after the other, in declaration order
    #[default]
    Sequential,
    /// All types at once; reporting is identical
    Concurrent,
}

/// When a pass counts as globally successful (and advances the sync timestamp)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessPolicy {
    /// At least one type succeeded
    #[default]
    AnySucceeded,
    /// Every attempted type succeeded
    AllSucceeded,
}

impl SuccessPolicy {
    pub fn is_success<'a>(self, statuses: impl IntoIterator<Item = &'a TypeSyncStatus>) -> bool {
        let mut attempted = 0usize;
        let mut succeeded = 0usize;
        for status in statuses {
            attempted += 1;
            if status.is_success() {
                succeeded += 1;
            }
        }
        match self {
            Self::AnySucceeded => succeeded > 0,
            Self::AllSucceeded => attempted > 0 && succeeded == attempted,
        }
    }
}

/// Outcome for one resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TypeSyncStatus {
    Success { row_count: usize },
    Error { error: String, class: ErrorClass },
}

impl TypeSyncStatus {
    fn from_error(error: &FieldSyncError) -> Self {
        Self::Error {
            error: error.to_string(),
            class: error.class(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Report of one pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    /// Connectivity check failed; nothing was fetched or written
    pub offline: bool,
    /// Ordered by resource type declaration
    pub per_type_status: BTreeMap<ResourceType, TypeSyncStatus>,
    pub success: bool,
    pub started_at: i64,
    pub finished_at: i64,
}

impl SyncRun {
    fn offline(at: i64) -> Self {
        Self {
            offline: true,
            per_type_status: BTreeMap::new(),
            success: false,
            started_at: at,
            finished_at: at,
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.per_type_status.values().filter(|s| s.is_success()).count()
    }

    pub fn failed_types(&self) -> Vec<ResourceType> {
        self.per_type_status
            .iter()
            .filter(|(_, s)| !s.is_success())
            .map(|(t, _)| *t)
            .collect()
    }

    /// e.g. "Synced 8/10 data types"
    pub fn summary(&self) -> String {
        if self.offline {
            return "Offline, sync skipped".to_string();
        }
        format!(
            "Synced {}/{} data types",
            self.succeeded_count(),
            self.per_type_status.len()
        )
    }
}

/// Tuning for [`ResourceSyncCoordinator`]
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub resource_types: Vec<ResourceType>,
    pub mode: SyncMode,
    pub success_policy: SuccessPolicy,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            resource_types: ResourceType::ALL.to_vec(),
            mode: SyncMode::default(),
            success_policy: SuccessPolicy::default(),
        }
    }
}

/// Marks a type as in flight until dropped, so a cancelled pass releases it
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<ResourceType>>>,
    resource_type: ResourceType,
}

impl InFlightGuard {
    fn try_acquire(
        in_flight: &Arc<Mutex<HashSet<ResourceType>>>,
        resource_type: ResourceType,
    ) -> Option<Self> {
        if !in_flight.lock().insert(resource_type) {
            return None;
        }
        Some(Self {
            in_flight: in_flight.clone(),
            resource_type,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.resource_type);
    }
}

pub struct ResourceSyncCoordinator {
    api: Arc<dyn ResourceApi>,
    monitor: Arc<NetworkMonitor>,
    local_store: Arc<LocalStore>,
    stamps: SyncStampStore,
    options: CoordinatorOptions,
    in_flight: Arc<Mutex<HashSet<ResourceType>>>,
}

impl ResourceSyncCoordinator {
    pub fn new(
        api: Arc<dyn ResourceApi>,
        monitor: Arc<NetworkMonitor>,
        local_store: Arc<LocalStore>,
        stamps: SyncStampStore,
        options: CoordinatorOptions,
    ) -> Result<Self> {
        if options.resource_types.is_empty() {
            return Err(FieldSyncError::Config(
                "at least one resource type must be configured".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        let mut resource_types = Vec::with_capacity(options.resource_types.len());
        for t in &options.resource_types {
            if seen.insert(*t) {
                resource_types.push(*t);
            }
        }
        resource_types.sort();

        Ok(Self {
            api,
            monitor,
            local_store,
            stamps,
            options: CoordinatorOptions {
                resource_types,
                ..options
            },
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub fn resource_types(&self) -> &[ResourceType] {
        &self.options.resource_types
    }

    pub fn success_policy(&self) -> SuccessPolicy {
        self.options.success_policy
    }

    /// Full pass over every configured type
    pub async fn sync_all(&self) -> SyncRun {
        let types = self.options.resource_types.clone();
        self.run(&types).await
    }

    /// Same pass restricted to one type
    pub async fn sync_one(&self, resource_type: ResourceType) -> SyncRun {
        self.run(&[resource_type]).await
    }

    async fn run(&self, types: &[ResourceType]) -> SyncRun {
        let started_at = now_millis();
        if !self.monitor.check_connection().await {
            info!("📴 offline, skipping sync of {} types", types.len());
            return SyncRun::offline(started_at);
        }

        let epoch = match self.stamps.epoch().await {
            Ok(epoch) => epoch,
            Err(e) => {
                warn!("⚠️ cannot read sync epoch, nothing synced: {}", e);
                let per_type_status = types
                    .iter()
                    .map(|t| (*t, TypeSyncStatus::from_error(&e)))
                    .collect();
                return SyncRun {
                    offline: false,
                    per_type_status,
                    success: false,
                    started_at,
                    finished_at: now_millis(),
                };
            }
        };

        info!("🔄 sync started: {} types ({:?})", types.len(), self.options.mode);
        let per_type_status: BTreeMap<ResourceType, TypeSyncStatus> = match self.options.mode {
            SyncMode::Sequential => {
                let mut statuses = BTreeMap::new();
                for t in types {
                    let status = self.sync_type(*t, epoch).await;
                    statuses.insert(*t, status);
                }
                statuses
            }
            SyncMode::Concurrent => join_all(
                types
                    .iter()
                    .map(|t| async move { (*t, self.sync_type(*t, epoch).await) }),
            )
            .await
            .into_iter()
            .collect(),
        };

        let finished_at = now_millis();
        let mut success = self.options.success_policy.is_success(per_type_status.values());
        if success {
            match self.stamps.record_in_epoch(finished_at, epoch).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    info!("sync state was reset during the run, result discarded");
                    success = false;
                }
                Err(e) => warn!("failed to record successful sync time: {}", e),
            }
        }

        let run = SyncRun {
            offline: false,
            per_type_status,
            success,
            started_at,
            finished_at,
        };
        info!(
            "🏁 {} in {} ms (success={})",
            run.summary(),
            finished_at - started_at,
            success
        );
        run
    }

    async fn sync_type(&self, resource_type: ResourceType, epoch: i64) -> TypeSyncStatus {
        let _guard = match InFlightGuard::try_acquire(&self.in_flight, resource_type) {
            Some(guard) => guard,
            None => {
                let err = FieldSyncError::SyncInProgress(resource_type.to_string());
                warn!("⚠️ {}: {}", resource_type, err);
                return TypeSyncStatus::from_error(&err);
            }
        };

        let outcome = match self.api.fetch(resource_type).await {
            Ok(records) => self.store_snapshot(resource_type, &records, epoch).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(row_count) => {
                info!("✅ {} synced: {} rows", resource_type, row_count);
                TypeSyncStatus::Success { row_count }
            }
            Err(e) => {
                warn!("⚠️ {} sync failed ({:?}): {}", resource_type, e.class(), e);
                TypeSyncStatus::from_error(&e)
            }
        }
    }

    async fn store_snapshot(
        &self,
        resource_type: ResourceType,
        records: &[ResourceRecord],
        epoch: i64,
    ) -> Result<usize> {
        self.stamps.ensure_epoch(epoch).await?;
        let row_count = self.local_store.replace_collection(resource_type, records).await?;
        match self.stamps.ensure_epoch(epoch).await {
            Ok(()) => Ok(row_count),
            Err(FieldSyncError::SyncReset) => {
                // the reset raced this write, take it back
                self.local_store.clear_collection(resource_type).await?;
                Err(FieldSyncError::SyncReset)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KvStore, SqliteStore};
    use crate::test_helpers::{online_monitor, FakeResourceApi};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        api: Arc<FakeResourceApi>,
        probe: Arc<crate::network::StaticProbe>,
        sqlite: SqliteStore,
        local_store: Arc<LocalStore>,
        stamps: SyncStampStore,
        coordinator: ResourceSyncCoordinator,
    }

    async fn fixture(options: CoordinatorOptions) -> Fixture {
        let dir = TempDir::new().unwrap();
        let api = Arc::new(FakeResourceApi::new());
        let (probe, monitor) = online_monitor();
        let sqlite = SqliteStore::open_in_memory().unwrap();
        let local_store = Arc::new(LocalStore::new(sqlite.clone()));
        let stamps = SyncStampStore::new(Arc::new(KvStore::new(dir.path()).await.unwrap()));
        let coordinator = ResourceSyncCoordinator::new(
            api.clone(),
            monitor,
            local_store.clone(),
            stamps.clone(),
            options,
        )
        .unwrap();
        Fixture {
            _dir: dir,
            api,
            probe,
            sqlite,
            local_store,
            stamps,
            coordinator,
        }
    }

    fn three_rows(resource_type: ResourceType) -> Vec<serde_json::Value> {
        (1..=3)
            .map(|n| json!({"id": format!("{}-{}", resource_type, n)}))
            .collect()
    }

    #[tokio::test]
    async fn ten_types_with_one_failing() {
        let f = fixture(CoordinatorOptions::default()).await;
        for t in ResourceType::ALL {
            f.api.respond_with(t, three_rows(t));
        }
        let failing = ResourceType::ALL[6];
        f.local_store
            .replace_collection(
                failing,
                &[crate::storage::ResourceRecord::new(json!({"id": "old"})).unwrap()],
            )
            .await
            .unwrap();
        f.api.fail_with(failing, || FieldSyncError::Network("connection reset".into()));

        let run = f.coordinator.sync_all().await;
        assert!(!run.offline);
        assert!(run.success);
        assert_eq!(run.per_type_status.len(), 10);
        assert_eq!(run.summary(), "Synced 9/10 data types");
        assert_eq!(run.failed_types(), vec![failing]);
        assert!(matches!(
            run.per_type_status[&failing],
            TypeSyncStatus::Error { class: ErrorClass::Transient, .. }
        ));
        for (t, status) in &run.per_type_status {
            if *t != failing {
                assert_eq!(*status, TypeSyncStatus::Success { row_count: 3 }, "{}", t);
            }
        }

        // report order is declaration order
        let order: Vec<_> = run.per_type_status.keys().copied().collect();
        assert_eq!(order, ResourceType::ALL.to_vec());
        // and so is fetch order in sequential mode
        assert_eq!(f.api.fetch_calls(), ResourceType::ALL.to_vec());

        // failed type keeps its previous snapshot, the others were replaced
        let kept = f.local_store.read_collection(failing).await.unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id(), "old");
        assert_eq!(f.local_store.read_collection(ResourceType::Shift).await.unwrap().len(), 3);

        assert_eq!(f.stamps.get().await.unwrap(), Some(run.finished_at));
    }

    #[tokio::test]
    async fn reset_during_run_discards_its_writes() {
        let f = fixture(CoordinatorOptions {
            resource_types: vec![ResourceType::Equipment, ResourceType::Shift],
            ..CoordinatorOptions::default()
        })
        .await;
        f.api.set_delay(Duration::from_millis(100));

        let (run, cleared) = tokio::join!(f.coordinator.sync_all(), async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            f.stamps.clear().await
        });
        cleared.unwrap();

        assert!(!run.success);
        assert!(run.per_type_status.values().all(|s| matches!(
            s,
            TypeSyncStatus::Error { class: ErrorClass::Reset, .. }
        )));
        assert_eq!(f.stamps.get().await.unwrap(), None);
        assert!(f.local_store.read_collection(ResourceType::Equipment).await.unwrap().is_empty());
        assert!(f.local_store.read_collection(ResourceType::Shift).await.unwrap().is_empty());

        // the next run belongs to the new epoch and goes through
        f.api.set_delay(Duration::ZERO);
        let run = f.coordinator.sync_all().await;
        assert!(run.success);
        assert!(f.stamps.get().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn offline_short_circuits() {
        let f = fixture(CoordinatorOptions::default()).await;
        f.probe.set_online(false);

        let run = f.coordinator.sync_all().await;
        assert!(run.offline);
        assert!(!run.success);
        assert!(run.per_type_status.is_empty());
        assert!(f.api.fetch_calls().is_empty());
        assert_eq!(f.stamps.get().await.unwrap(), None);

        let run = f.coordinator.sync_one(ResourceType::Material).await;
        assert!(run.offline);
        assert!(f.api.fetch_calls().is_empty());
    }

    #[tokio::test]
    async fn all_failing_does_not_record_success() {
        let f = fixture(CoordinatorOptions {
            resource_types: vec![ResourceType::Equipment, ResourceType::Shift],
            ..CoordinatorOptions::default()
        })
        .await;
        f.api.fail_with(ResourceType::Equipment, || FieldSyncError::from_status(503, "busy"));
        f.api.fail_with(ResourceType::Shift, || FieldSyncError::Network("reset".into()));

        let run = f.coordinator.sync_all().await;
        assert!(!run.success);
        assert_eq!(run.summary(), "Synced 0/2 data types");
        assert_eq!(f.stamps.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn persistence_failure_is_isolated() {
        let f = fixture(CoordinatorOptions::default()).await;
        f.sqlite
            .with_conn(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER disk_full BEFORE INSERT ON collection_record
                     WHEN NEW.collection = 'material'
                     BEGIN SELECT RAISE(ABORT, 'database or disk is full'); END;",
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let run = f.coordinator.sync_all().await;
        assert!(run.success);
        assert_eq!(run.failed_types(), vec![ResourceType::Material]);
        assert!(matches!(
            run.per_type_status[&ResourceType::Material],
            TypeSyncStatus::Error { class: ErrorClass::LocalPersistence, .. }
        ));
        assert_eq!(f.local_store.read_collection(ResourceType::Location).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn all_succeeded_policy() {
        let f = fixture(CoordinatorOptions {
            success_policy: SuccessPolicy::AllSucceeded,
            ..CoordinatorOptions::default()
        })
        .await;
        f.api.fail_with(ResourceType::Category, || FieldSyncError::from_status(404, "gone"));

        let run = f.coordinator.sync_all().await;
        assert!(!run.success);
        assert_eq!(f.stamps.get().await.unwrap(), None);

        f.api.respond_with(ResourceType::Category, vec![json!({"id": 1})]);
        let run = f.coordinator.sync_all().await;
        assert!(run.success);
        assert!(f.stamps.get().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sync_one_reports_single_type() {
        let f = fixture(CoordinatorOptions::default()).await;
        f.api.respond_with(ResourceType::Equipment, vec![json!({"id": 7}), json!({"id": 8}), json!({"id": 9})]);

        let run = f.coordinator.sync_one(ResourceType::Equipment).await;
        assert!(run.success);
        assert_eq!(run.per_type_status.len(), 1);
        assert_eq!(
            run.per_type_status[&ResourceType::Equipment],
            TypeSyncStatus::Success { row_count: 3 }
        );
        assert_eq!(f.api.fetch_calls(), vec![ResourceType::Equipment]);
    }

    #[tokio::test]
    async fn concurrent_mode_reports_like_sequential() {
        let f = fixture(CoordinatorOptions {
            mode: SyncMode::Concurrent,
            ..CoordinatorOptions::default()
        })
        .await;
        f.api.set_delay(Duration::from_millis(10));
        f.api.fail_with(ResourceType::GeofencePoint, || FieldSyncError::Timeout("slow".into()));

        let run = f.coordinator.sync_all().await;
        assert_eq!(run.per_type_status.len(), 10);
        assert_eq!(run.summary(), "Synced 9/10 data types");
        assert_eq!(run.failed_types(), vec![ResourceType::GeofencePoint]);
    }

    #[tokio::test]
    async fn overlapping_run_reports_in_progress() {
        let f = fixture(CoordinatorOptions {
            resource_types: vec![ResourceType::Equipment],
            ..CoordinatorOptions::default()
        })
        .await;
        f.api.set_delay(Duration::from_millis(50));

        let (first, second) = tokio::join!(
            f.coordinator.sync_all(),
            f.coordinator.sync_one(ResourceType::Equipment)
        );
        let (won, lost) = if first.success { (first, second) } else { (second, first) };
        assert!(won.success);
        assert!(!lost.success);
        assert!(matches!(
            lost.per_type_status[&ResourceType::Equipment],
            TypeSyncStatus::Error { class: ErrorClass::InProgress, .. }
        ));
        assert_eq!(f.api.fetch_calls().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_run_releases_its_types() {
        let f = fixture(CoordinatorOptions::default()).await;
        f.api.set_delay(Duration::from_millis(500));
        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), f.coordinator.sync_one(ResourceType::Shift))
                .await;
        assert!(cancelled.is_err());

        f.api.set_delay(Duration::ZERO);
        let run = f.coordinator.sync_one(ResourceType::Shift).await;
        assert!(run.success);
    }

    #[tokio::test]
    async fn empty_type_list_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let (_, monitor) = online_monitor();
        let result = ResourceSyncCoordinator::new(
            Arc::new(FakeResourceApi::new()),
            monitor,
            Arc::new(LocalStore::new(SqliteStore::open_in_memory().unwrap())),
            SyncStampStore::new(Arc::new(KvStore::new(dir.path()).await.unwrap())),
            CoordinatorOptions {
                resource_types: vec![],
                ..CoordinatorOptions::default()
            },
        );
        assert!(matches!(result, Err(FieldSyncError::Config(_))));
    }
}
