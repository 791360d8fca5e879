use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Arrival confirmation for one roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalUpdate {
    pub id: String,
    #[serde(default)]
    pub arrival_time: Option<String>,
}

impl ArrivalUpdate {
    /// Requested arrival time; `Ok(None)` means "use the time of processing".
    pub fn requested_time(&self) -> Result<Option<DateTime<Utc>>, String> {
        match self.arrival_time.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map(|value| Some(value.with_timezone(&Utc)))
                .map_err(|err| format!("invalid arrival_time: {err}")),
        }
    }
}

/// An arrival update the caller must retry or reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalReport {
    pub id: String,
    pub arrival_time: Option<String>,
    pub message: String,
}

impl ArrivalReport {
    pub const NOT_FOUND: &'static str = "data not found";

    pub fn not_found(update: &ArrivalUpdate) -> Self {
        Self::with_message(update, Self::NOT_FOUND)
    }

    pub fn with_message(update: &ArrivalUpdate, message: impl Into<String>) -> Self {
        Self {
            id: update.id.clone(),
            arrival_time: update.arrival_time.clone(),
            message: message.into(),
        }
    }
}
