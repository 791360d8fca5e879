use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bounded evacuation window for one site.
///
/// At most one session per site may have `end_date == None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvacuationSession {
    pub id: Uuid,
    pub worksite_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl EvacuationSession {
    pub fn new(worksite_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            worksite_id,
            created_at,
            end_date: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_date.is_none()
    }
}

/// Body of a session creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSessionRequest {
    pub worksite: Uuid,
}

/// Body of a session end request; `end_date` defaults to the time of processing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndSessionRequest {
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}
