//! Outbox DAO - outbox_entry table (append / list / delete, never update)

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::storage::entities::OutboxEntry;

pub struct OutboxDao<'a> {
    conn: &'a Connection,
}

const COLUMNS: &str = "id, kind, dedup_key, payload, enqueued_at";

impl<'a> OutboxDao<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, entry: &OutboxEntry) -> Result<()> {
        let payload = serde_json::to_string(&entry.payload)?;
        self.conn.execute(
            "INSERT INTO outbox_entry (id, kind, dedup_key, payload, enqueued_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![entry.id, entry.kind, entry.key, payload, entry.enqueued_at],
        )?;
        Ok(())
    }

    /// Entries in enqueue order, optionally for one kind
    pub fn list(&self, kind: Option<&str>) -> Result<Vec<OutboxEntry>> {
        let rows = match kind {
            Some(kind) => {
                let sql = format!("SELECT {} FROM outbox_entry WHERE kind = ?1 ORDER BY seq ASC", COLUMNS);
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![kind], row_to_raw)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let sql = format!("SELECT {} FROM outbox_entry ORDER BY seq ASC", COLUMNS);
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], row_to_raw)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        rows.into_iter().map(RawEntry::into_entry).collect()
    }

    pub fn get(&self, id: &str) -> Result<Option<OutboxEntry>> {
        let sql = format!("SELECT {} FROM outbox_entry WHERE id = ?1", COLUMNS);
        let raw = self.conn.query_row(&sql, params![id], row_to_raw).optional()?;
        raw.map(RawEntry::into_entry).transpose()
    }

    /// Returns whether a row was deleted
    pub fn delete(&self, id: &str) -> Result<bool> {
        let n = self.conn.execute("DELETE FROM outbox_entry WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    pub fn count(&self, kind: Option<&str>) -> Result<usize> {
        let n: i64 = match kind {
            Some(kind) => self.conn.query_row(
                "SELECT COUNT(*) FROM outbox_entry WHERE kind = ?1",
                params![kind],
                |r| r.get(0),
            )?,
            None => self.conn.query_row("SELECT COUNT(*) FROM outbox_entry", [], |r| r.get(0))?,
        };
        Ok(n as usize)
    }
}

struct RawEntry {
    id: String,
    kind: String,
    key: String,
    payload: String,
    enqueued_at: i64,
}

impl RawEntry {
    fn into_entry(self) -> Result<OutboxEntry> {
        Ok(OutboxEntry {
            id: self.id,
            kind: self.kind,
            key: self.key,
            payload: serde_json::from_str(&self.payload)?,
            enqueued_at: self.enqueued_at,
        })
    }
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        id: row.get(0)?,
        kind: row.get(1)?,
        key: row.get(2)?,
        payload: row.get(3)?,
        enqueued_at: row.get(4)?,
    })
}
