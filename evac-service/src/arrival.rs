use chrono::{DateTime, Utc};
use evac_protocol::evacuation::{ArrivalReport, ArrivalUpdate};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::storage::Storage;

/// Applies arrival confirmations one by one.
///
/// Returns only the updates the caller still has to deal with: unknown
/// entries, unreadable timestamps and failed writes. Reapplying an update
/// just overwrites the timestamp.
pub async fn apply_arrivals(
    storage: &dyn Storage,
    updates: &[ArrivalUpdate],
    now: DateTime<Utc>,
) -> Vec<ArrivalReport> {
    let mut unresolved = Vec::new();

    for update in updates {
        let Ok(entry_id) = Uuid::parse_str(update.id.trim()) else {
            unresolved.push(ArrivalReport::not_found(update));
            continue;
        };

        let arrival = match update.requested_time() {
            Ok(requested) => requested.unwrap_or(now),
            Err(message) => {
                unresolved.push(ArrivalReport::with_message(update, message));
                continue;
            }
        };

        match storage.record_arrival(entry_id, arrival).await {
            Ok(Some(entry)) => {
                debug!(entry = %entry.id, evacuation = %entry.evacuation_id, %arrival, "arrival recorded");
            }
            Ok(None) => unresolved.push(ArrivalReport::not_found(update)),
            Err(err) => {
                warn!(entry = %entry_id, error = %err, "failed to record arrival");
                unresolved.push(ArrivalReport::with_message(update, err.to_string()));
            }
        }
    }

    unresolved
}
