//! Resource types
//!
//! Closed set of master-data categories the app caches. Declaration order is
//! the sync order and the report order; adding a type needs a matching
//! server endpoint.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::FieldSyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    Equipment,
    Shift,
    #[serde(rename = "longshift")]
    LongShift,
    ActivityCategory,
    Material,
    Location,
    RentalCounterparty,
    GeofencePoint,
    Category,
    RecentTimesheets,
}

impl ResourceType {
    pub const ALL: [ResourceType; 10] = [
        Self::Equipment,
        Self::Shift,
        Self::LongShift,
        Self::ActivityCategory,
        Self::Material,
        Self::Location,
        Self::RentalCounterparty,
        Self::GeofencePoint,
        Self::Category,
        Self::RecentTimesheets,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equipment => "equipment",
            Self::Shift => "shift",
            Self::LongShift => "longshift",
            Self::ActivityCategory => "activity-category",
            Self::Material => "material",
            Self::Location => "location",
            Self::RentalCounterparty => "rental-counterparty",
            Self::GeofencePoint => "geofence-point",
            Self::Category => "category",
            Self::RecentTimesheets => "recent-timesheets",
        }
    }

    /// LocalStore collection holding this type's snapshot
    pub fn collection_name(self) -> &'static str {
        match self {
            Self::Equipment => "equipment",
            Self::Shift => "shift",
            Self::LongShift => "longshift",
            Self::ActivityCategory => "activity_category",
            Self::Material => "material",
            Self::Location => "location",
            Self::RentalCounterparty => "rental_counterparty",
            Self::GeofencePoint => "geofence_point",
            Self::Category => "category",
            Self::RecentTimesheets => "recent_timesheets",
        }
    }

    /// Path of the list endpoint, relative to the API base URL
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Equipment => "equipment",
            Self::Shift => "shifts",
            Self::LongShift => "long-shifts",
            Self::ActivityCategory => "activity-categories",
            Self::Material => "materials",
            Self::Location => "locations",
            Self::RentalCounterparty => "rental-counterparties",
            Self::GeofencePoint => "geofence-points",
            Self::Category => "categories",
            Self::RecentTimesheets => "timesheets/recent",
        }
    }
}

impl FromStr for ResourceType {
    type Err = FieldSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| FieldSyncError::InvalidData(format!("unknown resource type: {}", s)))
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn as_str_and_from_str() {
        for t in ResourceType::ALL {
            assert_eq!(ResourceType::from_str(t.as_str()).unwrap(), t);
        }
        assert_eq!(
            ResourceType::from_str("activity-category").unwrap(),
            ResourceType::ActivityCategory
        );
        assert!(ResourceType::from_str("timesheet").is_err());
    }

    #[test]
    fn ordering_follows_declaration() {
        let mut shuffled = vec![
            ResourceType::Category,
            ResourceType::Equipment,
            ResourceType::RecentTimesheets,
            ResourceType::LongShift,
        ];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![
                ResourceType::Equipment,
                ResourceType::LongShift,
                ResourceType::Category,
                ResourceType::RecentTimesheets,
            ]
        );
    }

    #[test]
    fn collection_names_are_distinct() {
        let names: HashSet<_> = ResourceType::ALL.iter().map(|t| t.collection_name()).collect();
        assert_eq!(names.len(), ResourceType::ALL.len());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&ResourceType::GeofencePoint).unwrap();
        assert_eq!(json, "\"geofence-point\"");
        let parsed: ResourceType = serde_json::from_str("\"longshift\"").unwrap();
        assert_eq!(parsed, ResourceType::LongShift);
    }
}
