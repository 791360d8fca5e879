//! Reference entities managed outside the ingestion core. Read-only here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical location under evacuation tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: Uuid,
    /// Network identifier the positioning feed reports for this site. Unique.
    pub external_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// Free-form person type (e.g. "contractor"), rendered into the roster role.
    pub kind: String,
    pub team_id: Uuid,
    pub company_id: Uuid,
}

impl Person {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A registered positioning beacon, optionally assigned to a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedAsset {
    pub id: Uuid,
    /// Hardware address as reported by the feed. Unique.
    pub mac_address: String,
    pub assigned_to: Option<Uuid>,
}
