use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRosterEntry {
    pub evacuation_id: Uuid,
    pub beacon_id: Uuid,
    pub assigned_to: Uuid,
}

/// One asset's membership in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: Uuid,
    pub evacuation_id: Uuid,
    pub beacon_id: Uuid,
    pub assigned_to: Uuid,
    pub arrival: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Display-ready roster row joined with asset, person, team and company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRow {
    pub id: Uuid,
    pub mac_address: String,
    pub assigned_to: Uuid,
    pub name: String,
    pub arrival_time: Option<DateTime<Utc>>,
    pub role: String,
    pub company: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFailure {
    pub beacon_id: Uuid,
    pub error: String,
}

/// Result of materializing the roster when a session starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotReport {
    pub created: Vec<RosterEntry>,
    pub failed: Vec<SnapshotFailure>,
    /// Set when the presence query itself failed and no entry could be attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_error: Option<String>,
}

impl SnapshotReport {
    pub fn query_failed(error: impl Into<String>) -> Self {
        Self {
            query_error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Entries actually written; failures are not counted.
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    /// No per-entry failure and no query failure.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.query_error.is_none()
    }
}
