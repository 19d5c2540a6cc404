//! Persistence layer
//!
//! - `sqlite` + `dao`: collection cache and outbox tables (rusqlite, refinery migrations)
//! - `kv`: sled store for small scalars (sync timestamp, session token)
//! - `local_store` / `outbox`: the async APIs the rest of the SDK uses
//!
//! Layout under the data directory:
//!
//! ```text
//! {data_dir}/fieldsync.db   collection_record, collection_meta, outbox_entry
//! {data_dir}/kv/            sled
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;

pub mod dao;
pub mod entities;
pub mod kv;
pub mod local_store;
pub mod migrate;
pub mod outbox;
pub mod outbox_drain;
pub mod retry_policy;
pub mod sqlite;

pub use entities::{CollectionInfo, OutboxEntry, ResourceRecord};
pub use kv::KvStore;
pub use local_store::LocalStore;
pub use outbox::{content_key, OutboxQueue};
pub use outbox_drain::{DrainReport, OutboxDrainer};
pub use retry_policy::RetryPolicy;
pub use sqlite::SqliteStore;

/// Opens every store under one data directory
#[derive(Debug, Clone)]
pub struct StorageManager {
    data_dir: PathBuf,
    kv: Arc<KvStore>,
    local_store: Arc<LocalStore>,
    outbox: Arc<OutboxQueue>,
}

impl StorageManager {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        let sqlite = SqliteStore::open(data_dir).await?;
        let kv = Arc::new(KvStore::new(data_dir).await?);
        tracing::info!("✅ storage initialized at {}", data_dir.display());
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            kv,
            local_store: Arc::new(LocalStore::new(sqlite.clone())),
            outbox: Arc::new(OutboxQueue::new(sqlite)),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn kv(&self) -> Arc<KvStore> {
        self.kv.clone()
    }

    pub fn local_store(&self) -> Arc<LocalStore> {
        self.local_store.clone()
    }

    pub fn outbox(&self) -> Arc<OutboxQueue> {
        self.outbox.clone()
    }
}
