//! Local collection cache
//!
//! One logical collection per resource type (plus any ad hoc names), each row
//! keyed by record id. Full syncs replace a collection in one transaction, so a
//! reader sees either the previous snapshot or the new one, never a mix.

use tracing::debug;

use crate::error::Result;
use crate::storage::dao::CollectionDao;
use crate::storage::entities::{CollectionInfo, ResourceRecord};
use crate::storage::sqlite::SqliteStore;
use crate::sync::ResourceType;
use crate::utils::now_millis;

#[derive(Debug, Clone)]
pub struct LocalStore {
    sqlite: SqliteStore,
}

impl LocalStore {
    pub fn new(sqlite: SqliteStore) -> Self {
        Self { sqlite }
    }

    /// Replace the cached snapshot of `resource_type`; returns the stored row count.
    ///
    /// Fails with `FieldSyncError::Storage` when the database cannot be written;
    /// the previous snapshot is left intact in that case.
    pub async fn replace_collection(
        &self,
        resource_type: ResourceType,
        records: &[ResourceRecord],
    ) -> Result<usize> {
        let collection = resource_type.collection_name();
        let now = now_millis();
        let stored = self
            .sqlite
            .with_conn(|conn| CollectionDao::new(conn).replace_all(collection, records, now))
            .await?;
        debug!("collection {} replaced: {} rows", collection, stored);
        Ok(stored)
    }

    /// Last replaced snapshot, empty if never synced
    pub async fn read_collection(&self, resource_type: ResourceType) -> Result<Vec<ResourceRecord>> {
        self.read_named(resource_type.collection_name()).await
    }

    /// Read any collection by name, including ad hoc ones written with [`Self::upsert_record`]
    pub async fn read_named(&self, collection: &str) -> Result<Vec<ResourceRecord>> {
        self.sqlite
            .with_conn(|conn| CollectionDao::new(conn).list(collection))
            .await
    }

    /// Insert-or-update one record outside of a full sync (local edit queues etc.)
    pub async fn upsert_record(&self, collection: &str, record: &ResourceRecord) -> Result<()> {
        let now = now_millis();
        self.sqlite
            .with_conn(|conn| CollectionDao::new(conn).upsert(collection, record, now))
            .await
    }

    pub async fn get_record(&self, collection: &str, id: &str) -> Result<Option<ResourceRecord>> {
        self.sqlite
            .with_conn(|conn| CollectionDao::new(conn).get(collection, id))
            .await
    }

    pub async fn delete_record(&self, collection: &str, id: &str) -> Result<bool> {
        self.sqlite
            .with_conn(|conn| CollectionDao::new(conn).delete(collection, id))
            .await
    }

    pub async fn collection_info(&self, resource_type: ResourceType) -> Result<CollectionInfo> {
        let collection = resource_type.collection_name();
        self.sqlite
            .with_conn(|conn| CollectionDao::new(conn).info(collection))
            .await
    }

    pub async fn clear_collection(&self, resource_type: ResourceType) -> Result<()> {
        let collection = resource_type.collection_name();
        self.sqlite
            .with_conn(|conn| CollectionDao::new(conn).clear(&[collection]))
            .await
    }

    /// Drop every synced resource collection (logout / account switch).
    ///
    /// Ad hoc collections written with [`Self::upsert_record`] hold user data
    /// and are kept.
    pub async fn clear_synced_collections(&self) -> Result<()> {
        let collections: Vec<&str> = ResourceType::ALL
            .iter()
            .map(|t| t.collection_name())
            .collect();
        self.sqlite
            .with_conn(|conn| CollectionDao::new(conn).clear(&collections))
            .await?;
        debug!("synced collections cleared");
        Ok(())
    }
}
