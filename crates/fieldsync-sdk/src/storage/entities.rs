//! Persisted entities
//!
//! Record contents are owned by the application; the SDK only reads `id`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldSyncError, Result};

/// One cached row of master data.
///
/// (De)serializes as the raw JSON object, so `Vec<ResourceRecord>` parses
/// straight from a response array. Numeric ids are normalized to strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ResourceRecord {
    id: String,
    body: Value,
}

impl ResourceRecord {
    /// Wrap a JSON object; fails unless it has a string or integer `id`
    pub fn new(body: Value) -> Result<Self> {
        let id = match body.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
            Some(other) => {
                return Err(FieldSyncError::InvalidData(format!(
                    "record id must be a non-empty string or integer, got {}",
                    other
                )))
            }
            None => {
                return Err(FieldSyncError::InvalidData(
                    "record has no `id` field".to_string(),
                ))
            }
        };
        if !body.is_object() {
            return Err(FieldSyncError::InvalidData("record must be a JSON object".to_string()));
        }
        Ok(Self { id, body })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    /// Field lookup for pickers and labels
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }
}

impl TryFrom<Value> for ResourceRecord {
    type Error = FieldSyncError;

    fn try_from(value: Value) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ResourceRecord> for Value {
    fn from(record: ResourceRecord) -> Self {
        record.body
    }
}

/// Cache bookkeeping for one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub collection: String,
    pub row_count: usize,
    /// Last full replace, `None` if only ad hoc upserts ever touched it
    pub replaced_at: Option<i64>,
}

/// Pending mutation. Immutable once written; only removed as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: String,
    /// e.g. "timesheet"
    pub kind: String,
    /// Caller-chosen dedup key, not enforced by the queue
    pub key: String,
    pub payload: Value,
    pub enqueued_at: i64,
}
