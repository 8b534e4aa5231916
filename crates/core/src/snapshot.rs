//! Readiness snapshot payload.
//!
//! The payload is an owned, fully-serialised copy of the run and its
//! attachments at lock time. It is stored as JSONB and never rewritten,
//! so later changes to the run cannot reach it.

use serde::{Deserialize, Serialize};

use crate::readiness::ReadinessSummary;
use crate::types::{DbId, Timestamp};

/// Run fields frozen at lock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRunState {
    pub id: DbId,
    pub name: String,
    pub status: String,
    pub portal_id: Option<DbId>,
    pub zone_id: Option<DbId>,
    pub starts_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub expected_request_count: Option<i64>,
}

/// An attached request as it looked at lock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub request_id: DbId,
    pub attached_at: Timestamp,
    pub coordination_opt_in: bool,
    pub status: String,
    pub zone_id: Option<DbId>,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub run: SnapshotRunState,
    pub requests: Vec<SnapshotRequest>,
    pub summary: ReadinessSummary,
}

impl SnapshotPayload {
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::DriftCounts;
    use crate::readiness::Coverage;
    use chrono::Utc;

    #[test]
    fn payload_survives_json_storage() {
        let payload = SnapshotPayload {
            run: SnapshotRunState {
                id: 1,
                name: "North loop".to_string(),
                status: "scheduled".to_string(),
                portal_id: Some(2),
                zone_id: Some(3),
                starts_at: Some(Utc::now()),
                ends_at: None,
                expected_request_count: Some(5),
            },
            requests: vec![SnapshotRequest {
                request_id: 10,
                attached_at: Utc::now(),
                coordination_opt_in: true,
                status: "open".to_string(),
                zone_id: Some(3),
                category: "electrical".to_string(),
            }],
            summary: ReadinessSummary {
                attached_count: 1,
                coord_ready_count: 1,
                drift: DriftCounts::default(),
                coverage: Coverage::NotYetMeasurable {
                    actual: 1,
                    expected: 5,
                    min_sample: 30,
                },
            },
        };
        let json = payload.to_json().unwrap();
        assert_eq!(json["summary"]["coverage"]["state"], "not_yet_measurable");
        assert_eq!(SnapshotPayload::from_json(&json).unwrap(), payload);
    }
}
