//! Remote API contract
//!
//! Every list endpoint answers with the same envelope, `{"data": [...]}`.
//! Anything else is a contract violation and surfaces as `InvalidData`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldSyncError, Result};
use crate::storage::ResourceRecord;
use crate::sync::ResourceType;

/// Remote fetch and submit, implemented over HTTP by [`crate::http_client::HttpResourceApi`]
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Full current list for one resource type
    async fn fetch(&self, resource_type: ResourceType) -> Result<Vec<ResourceRecord>>;

    /// Deliver one mutation (e.g. a timesheet) to the server
    async fn submit(&self, kind: &str, payload: &Value) -> Result<SubmitAck>;
}

/// Server acknowledgement of a submitted mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAck {
    /// Server-side id, when the endpoint returns one
    pub id: Option<String>,
    pub body: Value,
}

impl SubmitAck {
    pub fn from_body(body: Value) -> Self {
        let id = body.get("data").unwrap_or(&body).get("id").and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        Self { id, body }
    }
}

/// `{"data": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub data: T,
}

impl ResponseEnvelope<Vec<ResourceRecord>> {
    /// Parse a list response body
    pub fn parse_records(bytes: &[u8]) -> Result<Vec<ResourceRecord>> {
        let envelope: ResponseEnvelope<Vec<ResourceRecord>> = serde_json::from_slice(bytes)
            .map_err(|e| FieldSyncError::InvalidData(format!("unexpected response shape: {}", e)))?;
        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_envelope() {
        let body = br#"{"data": [{"id": 1, "name": "Crane"}, {"id": "2"}], "meta": {"total": 2}}"#;
        let records = ResponseEnvelope::parse_records(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), "1");
    }

    #[test]
    fn bare_array_is_rejected() {
        let err = ResponseEnvelope::parse_records(br#"[{"id": 1}]"#).unwrap_err();
        assert!(matches!(err, FieldSyncError::InvalidData(_)));

        let err = ResponseEnvelope::parse_records(br#"{"data": [{"name": "no id"}]}"#).unwrap_err();
        assert!(matches!(err, FieldSyncError::InvalidData(_)));
    }

    #[test]
    fn ack_picks_up_id() {
        assert_eq!(SubmitAck::from_body(json!({"data": {"id": 91}})).id.as_deref(), Some("91"));
        assert_eq!(SubmitAck::from_body(json!({"id": "t-1"})).id.as_deref(), Some("t-1"));
        assert_eq!(SubmitAck::from_body(json!({"ok": true})).id, None);
    }
}
