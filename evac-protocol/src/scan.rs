use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::feed::Observation;

/// Scan record ready to be written; built from one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScanRecord {
    pub mac_address: String,
    pub worksite_id: Uuid,
    pub beacon_id: Option<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub scanned_at: DateTime<Utc>,
}

impl NewScanRecord {
    /// Builds the record for an observation, using its most recent fix.
    ///
    /// Coordinates are set only when both axes resolve to known values.
    pub fn from_observation(
        observation: &Observation,
        worksite_id: Uuid,
        scanned_at: DateTime<Utc>,
    ) -> Self {
        let coordinates = observation
            .latest_fix()
            .and_then(|location| location.coordinates());

        Self {
            mac_address: observation.client_mac.clone(),
            worksite_id,
            beacon_id: None,
            latitude: coordinates.map(|(lat, _)| lat),
            longitude: coordinates.map(|(_, lng)| lng),
            scanned_at,
        }
    }
}

/// Persisted scan record. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: Uuid,
    pub mac_address: String,
    pub worksite_id: Uuid,
    pub beacon_id: Option<Uuid>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub scanned_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Row of the "latest scan per asset" view used for roster snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentAsset {
    pub beacon_id: Uuid,
    pub assigned_to: Uuid,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Stored,
    Failed,
    TimedOut,
}

/// Per-device result of an ingestion batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub mac_address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub worksite: Uuid,
    pub beacon: Option<Uuid>,
    pub scanned_at: DateTime<Utc>,
    pub status: ScanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ScanOutcome {
    pub fn stored(record: &ScanRecord, warning: Option<String>) -> Self {
        Self {
            mac_address: record.mac_address.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            worksite: record.worksite_id,
            beacon: record.beacon_id,
            scanned_at: record.scanned_at,
            status: ScanStatus::Stored,
            record_id: Some(record.id),
            error: None,
            warning,
        }
    }

    pub fn failed(record: &NewScanRecord, status: ScanStatus, error: impl Into<String>) -> Self {
        Self {
            mac_address: record.mac_address.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            worksite: record.worksite_id,
            beacon: record.beacon_id,
            scanned_at: record.scanned_at,
            status,
            record_id: None,
            error: Some(error.into()),
            warning: None,
        }
    }

    pub fn is_stored(&self) -> bool {
        self.status == ScanStatus::Stored
    }
}
