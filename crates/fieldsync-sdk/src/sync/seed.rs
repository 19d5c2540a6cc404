//! Bootstrap dataset used before the first successful sync

use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{FieldSyncError, Result};
use crate::storage::ResourceRecord;
use crate::sync::ResourceType;

/// Source of records to show while a collection has never been synced
pub trait SeedDataset: Send + Sync {
    fn records(&self, resource_type: ResourceType) -> Vec<ResourceRecord>;
}

/// Seed kept in memory, usually loaded from a JSON file shipped with the app
#[derive(Debug, Clone, Default)]
pub struct StaticSeedDataset {
    records: HashMap<ResourceType, Vec<ResourceRecord>>,
}

impl StaticSeedDataset {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from `{"equipment": [...], "shift": [...], ...}`; unknown keys are rejected
    pub fn from_json(value: Value) -> Result<Self> {
        let object = match value {
            Value::Object(map) => map,
            other => {
                return Err(FieldSyncError::InvalidData(format!(
                    "seed must be an object keyed by resource type, got {}",
                    other
                )))
            }
        };
        let mut records = HashMap::new();
        for (name, list) in object {
            let resource_type: ResourceType = name.parse()?;
            let list: Vec<ResourceRecord> = serde_json::from_value(list).map_err(|e| {
                FieldSyncError::InvalidData(format!("seed for {}: {}", resource_type, e))
            })?;
            records.insert(resource_type, list);
        }
        Ok(Self { records })
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json(serde_json::from_slice(&bytes)?)
    }

    pub fn with(mut self, resource_type: ResourceType, records: Vec<ResourceRecord>) -> Self {
        self.records.insert(resource_type, records);
        self
    }
}

impl SeedDataset for StaticSeedDataset {
    fn records(&self, resource_type: ResourceType) -> Vec<ResourceRecord> {
        self.records.get(&resource_type).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_by_wire_name() {
        let seed = StaticSeedDataset::from_json(json!({
            "equipment": [{"id": 1, "name": "Loader"}],
            "activity-category": [{"id": "ac1"}, {"id": "ac2"}],
        }))
        .unwrap();
        assert_eq!(seed.records(ResourceType::Equipment).len(), 1);
        assert_eq!(seed.records(ResourceType::ActivityCategory).len(), 2);
        assert!(seed.records(ResourceType::Shift).is_empty());
    }

    #[test]
    fn from_json_rejects_unknown_types() {
        assert!(StaticSeedDataset::from_json(json!({"vehicles": []})).is_err());
        assert!(StaticSeedDataset::from_json(json!([1, 2])).is_err());
    }
}
