//! SDK entry point
//!
//! [`FieldSyncConfig`] describes where data lives and how sync behaves;
//! [`FieldSyncSDK::initialize`] wires storage, connectivity, the remote API
//! and the sync components together.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{FieldSyncError, Result};
use crate::http_client::HttpResourceApi;
use crate::lifecycle::{LifecycleManager, SyncLifecycleHook};
use crate::mutation::{MutationGateway, SubmitOutcome};
use crate::network::{ConnectivityProbe, NetworkMonitor, NetworkStatusEvent, StaticProbe};
use crate::session::{Authenticator, SessionManager, SessionProvider};
use crate::storage::{
    CollectionInfo, DrainReport, OutboxDrainer, OutboxEntry, OutboxQueue, ResourceRecord,
    RetryPolicy, StorageManager,
};
use crate::sync::{
    CoordinatorOptions, ResourceApi, ResourceSyncCoordinator, ResourceType, SeedDataset,
    SuccessPolicy, SyncMode, SyncRun, SyncScheduler, SyncStampStore,
};

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpClientConfig {
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(10),
            request_timeout_secs: Some(30),
        }
    }
}

/// FieldSync SDK configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSyncConfig {
    /// Holds `fieldsync.db` and `kv/`
    pub data_dir: PathBuf,
    /// e.g. https://api.example.com/v1
    pub api_base_url: String,
    pub http_client_config: HttpClientConfig,
    /// Staleness window for TTL-gated sync
    pub sync_ttl_secs: u64,
    /// Types synced by a full pass, reported in declaration order
    pub resource_types: Vec<ResourceType>,
    pub sync_mode: SyncMode,
    pub success_policy: SuccessPolicy,
    /// Replay the outbox whenever connectivity comes back
    pub auto_drain_on_reconnect: bool,
    /// Backoff of the reconnect drain worker
    pub retry_config: RetryPolicy,
}

impl Default for FieldSyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./fieldsync_data"),
            api_base_url: String::new(),
            http_client_config: HttpClientConfig::default(),
            sync_ttl_secs: 24 * 60 * 60,
            resource_types: ResourceType::ALL.to_vec(),
            sync_mode: SyncMode::default(),
            success_policy: SuccessPolicy::default(),
            auto_drain_on_reconnect: false,
            retry_config: RetryPolicy::default(),
        }
    }
}

impl FieldSyncConfig {
    pub fn builder() -> FieldSyncConfigBuilder {
        FieldSyncConfigBuilder::new()
    }

    /// Load a JSON config file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            FieldSyncError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|e| {
            FieldSyncError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(FieldSyncError::Config("api_base_url is required".to_string()));
        }
        if self.resource_types.is_empty() {
            return Err(FieldSyncError::Config(
                "resource_types must not be empty".to_string(),
            ));
        }
        if self.sync_ttl_secs == 0 {
            return Err(FieldSyncError::Config("sync_ttl_secs must be positive".to_string()));
        }
        if self.retry_config.backoff_factor < 1.0 {
            return Err(FieldSyncError::Config(
                "retry_config.backoff_factor must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sync_ttl(&self) -> Duration {
        Duration::from_secs(self.sync_ttl_secs)
    }
}

/// FieldSync SDK configuration builder
pub struct FieldSyncConfigBuilder {
    config: FieldSyncConfig,
}

impl FieldSyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: FieldSyncConfig::default(),
        }
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.data_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn api_base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn http_client_config(mut self, config: HttpClientConfig) -> Self {
        self.config.http_client_config = config;
        self
    }

    pub fn sync_ttl_secs(mut self, secs: u64) -> Self {
        self.config.sync_ttl_secs = secs;
        self
    }

    pub fn resource_types<I>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = ResourceType>,
    {
        self.config.resource_types = types.into_iter().collect();
        self
    }

    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.config.sync_mode = mode;
        self
    }

    pub fn success_policy(mut self, policy: SuccessPolicy) -> Self {
        self.config.success_policy = policy;
        self
    }

    pub fn auto_drain_on_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_drain_on_reconnect = enabled;
        self
    }

    pub fn retry_config(mut self, config: RetryPolicy) -> Self {
        self.config.retry_config = config;
        self
    }

    pub fn build(self) -> FieldSyncConfig {
        self.config
    }
}

impl Default for FieldSyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Platform-provided pieces. Anything left `None` gets a default:
/// an always-reachable probe, no authentication, no seed, and the HTTP API.
#[derive(Default)]
pub struct Collaborators {
    pub probe: Option<Arc<dyn ConnectivityProbe>>,
    pub authenticator: Option<Arc<dyn Authenticator>>,
    pub seed: Option<Arc<dyn SeedDataset>>,
    /// Replaces the HTTP implementation (tests, alternative transports)
    pub api: Option<Arc<dyn ResourceApi>>,
}

/// FieldSync SDK
///
/// Layers:
/// - storage: `StorageManager` (SQLite collections + outbox, sled KV)
/// - connectivity: `NetworkMonitor`
/// - remote: `ResourceApi` behind the shared session
/// - sync: coordinator, scheduler, mutation gateway, outbox drainer
pub struct FieldSyncSDK {
    config: FieldSyncConfig,
    storage: StorageManager,
    network: Arc<NetworkMonitor>,
    session: Option<Arc<SessionManager>>,
    seed: Option<Arc<dyn SeedDataset>>,
    coordinator: Arc<ResourceSyncCoordinator>,
    scheduler: Arc<SyncScheduler>,
    gateway: MutationGateway,
    drainer: Arc<OutboxDrainer>,
    lifecycle_manager: RwLock<LifecycleManager>,
    shutdown: CancellationToken,
    drain_worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl FieldSyncSDK {
    /// Initialization order: storage -> network -> session/remote -> sync -> lifecycle
    pub async fn initialize(config: FieldSyncConfig, collaborators: Collaborators) -> Result<Arc<Self>> {
        info!("initializing {}", crate::version::describe());
        config.validate()?;

        let storage = StorageManager::new(&config.data_dir).await?;

        let probe = collaborators
            .probe
            .unwrap_or_else(|| Arc::new(StaticProbe::new(true)));
        let network = Arc::new(NetworkMonitor::new(probe));
        network.check_connection().await;

        let session = collaborators
            .authenticator
            .map(|auth| Arc::new(SessionManager::new(storage.kv(), auth)));
        let api: Arc<dyn ResourceApi> = match collaborators.api {
            Some(api) => api,
            None => Arc::new(HttpResourceApi::new(
                &config.http_client_config,
                &config.api_base_url,
                session.clone().map(|s| s as Arc<dyn SessionProvider>),
            )?),
        };

        let stamps = SyncStampStore::new(storage.kv());
        let coordinator = Arc::new(ResourceSyncCoordinator::new(
            api.clone(),
            network.clone(),
            storage.local_store(),
            stamps.clone(),
            CoordinatorOptions {
                resource_types: config.resource_types.clone(),
                mode: config.sync_mode,
                success_policy: config.success_policy,
            },
        )?);
        let scheduler = Arc::new(SyncScheduler::new(coordinator.clone(), stamps));
        let gateway = MutationGateway::new(api.clone(), storage.outbox(), network.clone());
        let drainer = Arc::new(OutboxDrainer::new(
            api,
            storage.outbox(),
            network.clone(),
            config.retry_config.clone(),
        ));

        let mut lifecycle_manager = LifecycleManager::new();
        lifecycle_manager.register_hook(Arc::new(SyncLifecycleHook::new(
            scheduler.clone(),
            storage.local_store(),
            session.clone().map(|s| s as Arc<dyn SessionProvider>),
            config.sync_ttl(),
        )));

        let shutdown = CancellationToken::new();
        let drain_worker = if config.auto_drain_on_reconnect {
            info!("outbox drain on reconnect enabled");
            Some(drainer.clone().spawn_on_reconnect(shutdown.child_token()))
        } else {
            None
        };

        info!("✅ FieldSyncSDK ready (online={})", network.is_online());
        Ok(Arc::new(Self {
            config,
            storage,
            network,
            session,
            seed: collaborators.seed,
            coordinator,
            scheduler,
            gateway,
            drainer,
            lifecycle_manager: RwLock::new(lifecycle_manager),
            shutdown,
            drain_worker: parking_lot::Mutex::new(drain_worker),
        }))
    }

    pub fn config(&self) -> &FieldSyncConfig {
        &self.config
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    // ---- connectivity ----

    pub fn is_online(&self) -> bool {
        self.network.is_online()
    }

    pub async fn check_connection(&self) -> bool {
        self.network.check_connection().await
    }

    /// Forward a reachability change from the platform layer
    pub fn set_network_status(&self, online: bool) {
        self.network.set_online(online);
    }

    pub fn subscribe_network_status(&self) -> tokio::sync::broadcast::Receiver<NetworkStatusEvent> {
        self.network.subscribe()
    }

    // ---- sync ----

    pub async fn sync_all(&self) -> SyncRun {
        self.coordinator.sync_all().await
    }

    pub async fn sync_one(&self, resource_type: ResourceType) -> SyncRun {
        self.coordinator.sync_one(resource_type).await
    }

    pub async fn force_sync(&self) -> SyncRun {
        self.scheduler.force_sync().await
    }

    /// Full pass if the cache is older than the configured TTL
    pub async fn sync_if_due(&self) -> Result<Option<SyncRun>> {
        self.scheduler.sync_if_due(self.config.sync_ttl()).await
    }

    pub async fn is_sync_due(&self) -> Result<bool> {
        self.scheduler.is_sync_due(self.config.sync_ttl()).await
    }

    pub async fn last_successful_sync_at(&self) -> Result<Option<i64>> {
        self.scheduler.last_successful_sync_at().await
    }

    pub async fn clear_sync_state(&self) -> Result<()> {
        self.scheduler.clear_sync_state().await
    }

    /// Cached records of `resource_type`, or the seed while nothing was ever cached
    pub async fn resource_records(&self, resource_type: ResourceType) -> Result<Vec<ResourceRecord>> {
        let cached = self.storage.local_store().read_collection(resource_type).await?;
        if !cached.is_empty() {
            return Ok(cached);
        }
        Ok(self
            .seed
            .as_ref()
            .map(|seed| seed.records(resource_type))
            .unwrap_or_default())
    }

    pub async fn collection_info(&self, resource_type: ResourceType) -> Result<CollectionInfo> {
        self.storage.local_store().collection_info(resource_type).await
    }

    // ---- mutations ----

    pub async fn submit(&self, kind: &str, key: &str, payload: Value) -> Result<SubmitOutcome> {
        self.gateway.submit(kind, key, payload).await
    }

    pub fn outbox(&self) -> Arc<OutboxQueue> {
        self.storage.outbox()
    }

    pub async fn pending_mutations(&self, kind: Option<&str>) -> Result<Vec<OutboxEntry>> {
        self.storage.outbox().list(kind).await
    }

    pub async fn drain_outbox(&self, kind: Option<&str>) -> Result<DrainReport> {
        self.drainer.drain_once(kind).await
    }

    /// Retry entries the server rejected earlier, e.g. after the data was corrected
    pub fn release_rejected_mutations(&self) {
        self.drainer.release_rejected();
    }

    // ---- session & lifecycle ----

    /// Store a token from the interactive login screen
    pub async fn set_session_token(&self, token: &str) -> Result<()> {
        match &self.session {
            Some(session) => session.set_token(token).await,
            None => Err(FieldSyncError::Config(
                "no authenticator configured".to_string(),
            )),
        }
    }

    pub async fn register_lifecycle_hook(&self, hook: Arc<dyn crate::lifecycle::LifecycleHook>) {
        self.lifecycle_manager.write().await.register_hook(hook);
    }

    pub async fn on_app_foreground(&self) -> Result<()> {
        self.lifecycle_manager.read().await.notify_foreground().await
    }

    pub async fn on_app_background(&self) -> Result<()> {
        self.lifecycle_manager.read().await.notify_background().await
    }

    pub async fn on_login(&self) -> Result<()> {
        self.lifecycle_manager.read().await.notify_login().await
    }

    /// Drops cached collections, sync state and session; the outbox is kept
    pub async fn logout(&self) -> Result<()> {
        self.lifecycle_manager.read().await.notify_logout().await
    }

    /// Stop background workers
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let worker = self.drain_worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
        info!("FieldSyncSDK shut down");
    }
}
