//! FieldSync SDK - offline-first master-data sync for field timesheet apps
//!
//! - 🗂️ Local collection cache per resource type, replaced atomically on sync
//! - 📡 Connectivity monitoring, fail-closed when the platform probe misbehaves
//! - 🔄 Partial-failure-tolerant sync passes with TTL gating
//! - 📥 Durable outbox so writes made offline are never lost
//!
//! # Quick start
//!
//! ```rust,no_run
//! use fieldsync_sdk::{Collaborators, FieldSyncConfig, FieldSyncSDK, ResourceType};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FieldSyncConfig::builder()
//!         .data_dir("/path/to/data")
//!         .api_base_url("https://api.example.com/v1")
//!         .build();
//!
//!     let sdk = FieldSyncSDK::initialize(config, Collaborators::default()).await?;
//!
//!     if let Some(run) = sdk.sync_if_due().await? {
//!         println!("{}", run.summary());
//!     }
//!     let equipment = sdk.resource_records(ResourceType::Equipment).await?;
//!     println!("{} machines cached", equipment.len());
//!
//!     sdk.submit("timesheet", "2024-05-01/e1", json!({"equipment": "e1", "hours": 8}))
//!         .await?;
//!
//!     sdk.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod http_client;
pub mod lifecycle;
pub mod mutation;
pub mod network;
pub mod sdk;
pub mod session;
pub mod storage;
pub mod sync;
pub mod utils;
pub mod version;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::{ErrorClass, FieldSyncError, Result};
pub use http_client::HttpResourceApi;
pub use lifecycle::{LifecycleHook, LifecycleManager, SyncLifecycleHook};
pub use mutation::{MutationGateway, SubmitOutcome};
pub use network::{ConnectivityProbe, NetworkMonitor, NetworkStatusEvent, StaticProbe, Subscription};
pub use sdk::{Collaborators, FieldSyncConfig, FieldSyncConfigBuilder, FieldSyncSDK, HttpClientConfig};
pub use session::{Authenticator, SessionManager, SessionProvider};
pub use storage::{
    content_key, CollectionInfo, DrainReport, LocalStore, OutboxDrainer, OutboxEntry, OutboxQueue,
    ResourceRecord, RetryPolicy, StorageManager,
};
pub use sync::{
    ResourceApi, ResourceSyncCoordinator, ResourceType, SeedDataset, StaticSeedDataset,
    SubmitAck, SuccessPolicy, SyncMode, SyncRun, SyncScheduler, TypeSyncStatus, DEFAULT_SYNC_TTL,
};
pub use version::{SDK_DB_VERSION, SDK_VERSION};
