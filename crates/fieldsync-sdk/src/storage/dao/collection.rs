//! Collection DAO - collection_record / collection_meta tables

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{FieldSyncError, Result};
use crate::storage::entities::{CollectionInfo, ResourceRecord};

pub struct CollectionDao<'a> {
    conn: &'a Connection,
}

impl<'a> CollectionDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Swap the whole collection for `records` in one transaction.
    ///
    /// Duplicate ids keep the last occurrence. Returns the stored row count.
    pub fn replace_all(&self, collection: &str, records: &[ResourceRecord], now: i64) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM collection_record WHERE collection = ?1",
            params![collection],
        )?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO collection_record (collection, record_id, position, body, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for (position, record) in records.iter().enumerate() {
                let body = serde_json::to_string(record.body())?;
                stmt.execute(params![collection, record.id(), position as i64, body, now])?;
            }
        }
        tx.execute(
            r#"
            INSERT INTO collection_meta (collection, replaced_at) VALUES (?1, ?2)
            ON CONFLICT(collection) DO UPDATE SET replaced_at = excluded.replaced_at
            "#,
            params![collection, now],
        )?;
        let row_count = count_in(&tx, collection)?;
        tx.commit()?;
        Ok(row_count)
    }

    /// Insert-or-update by id; new rows go to the end of the collection
    pub fn upsert(&self, collection: &str, record: &ResourceRecord, now: i64) -> Result<()> {
        let body = serde_json::to_string(record.body())?;
        self.conn.execute(
            r#"
            INSERT INTO collection_record (collection, record_id, position, body, updated_at)
            VALUES (
                ?1, ?2,
                (SELECT COALESCE(MAX(position), -1) + 1 FROM collection_record WHERE collection = ?1),
                ?3, ?4
            )
            ON CONFLICT(collection, record_id) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
            params![collection, record.id(), body, now],
        )?;
        Ok(())
    }

    pub fn list(&self, collection: &str) -> Result<Vec<ResourceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT body FROM collection_record WHERE collection = ?1 ORDER BY position ASC",
        )?;
        let bodies = stmt
            .query_map(params![collection], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        bodies
            .iter()
            .map(|body| {
                let value: serde_json::Value = serde_json::from_str(body)?;
                ResourceRecord::new(value)
            })
            .collect()
    }

    pub fn get(&self, collection: &str, id: &str) -> Result<Option<ResourceRecord>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM collection_record WHERE collection = ?1 AND record_id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(body) => Ok(Some(ResourceRecord::new(serde_json::from_str(&body)?)?)),
            None => Ok(None),
        }
    }

    pub fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let n = self.conn.execute(
            "DELETE FROM collection_record WHERE collection = ?1 AND record_id = ?2",
            params![collection, id],
        )?;
        Ok(n > 0)
    }

    pub fn info(&self, collection: &str) -> Result<CollectionInfo> {
        let row_count = count_in(self.conn, collection)?;
        let replaced_at: Option<i64> = self
            .conn
            .query_row(
                "SELECT replaced_at FROM collection_meta WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()?;
        Ok(CollectionInfo {
            collection: collection.to_string(),
            row_count,
            replaced_at,
        })
    }

    /// Drop the named collections and their meta rows; other collections are untouched
    pub fn clear(&self, collections: &[&str]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for collection in collections {
            tx.execute(
                "DELETE FROM collection_record WHERE collection = ?1",
                params![collection],
            )?;
            tx.execute(
                "DELETE FROM collection_meta WHERE collection = ?1",
                params![collection],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn count_in(conn: &Connection, collection: &str) -> Result<usize> {
    let n: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM collection_record WHERE collection = ?1",
            params![collection],
            |r| r.get(0),
        )
        .map_err(|e| FieldSyncError::Storage(format!("failed to count {}: {}", collection, e)))?;
    Ok(n as usize)
}
