use std::str::FromStr;

use chrono::Duration;
use evac_core::errors::{EvacError, Result};
use evac_protocol::evacuation::{
    EvacuationSession, NewRosterEntry, RosterRow, SnapshotFailure, SnapshotReport,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::storage::Storage;

/// How recently an asset must have been scanned to count as present.
pub const RECENCY_WINDOW_SECS: i64 = 120;

pub fn recency_window() -> Duration {
    Duration::seconds(RECENCY_WINDOW_SECS)
}

/// Materializes the roster of a freshly created session.
///
/// Entries are inserted one by one with no transaction; a failed insert is
/// recorded and the rest of the snapshot continues. The session already
/// exists when this runs, so a failed presence query is reported in the
/// snapshot instead of being returned as an error.
pub async fn snapshot_roster(
    storage: &dyn Storage,
    session: &EvacuationSession,
) -> SnapshotReport {
    let seen_since = session.created_at - recency_window();
    let present = match storage
        .present_assets(session.worksite_id, seen_since)
        .await
    {
        Ok(present) => present,
        Err(err) => {
            error!(
                evacuation = %session.id,
                worksite = %session.worksite_id,
                error = %err,
                "presence query failed, evacuation started with an empty roster"
            );
            return SnapshotReport::query_failed(err.to_string());
        }
    };

    let mut report = SnapshotReport::default();
    for asset in present {
        let entry = NewRosterEntry {
            evacuation_id: session.id,
            beacon_id: asset.beacon_id,
            assigned_to: asset.assigned_to,
        };
        match storage.insert_roster_entry(entry).await {
            Ok(created) => report.created.push(created),
            Err(err) => {
                warn!(
                    evacuation = %session.id,
                    beacon = %asset.beacon_id,
                    error = %err,
                    "failed to add asset to roster"
                );
                report.failed.push(SnapshotFailure {
                    beacon_id: asset.beacon_id,
                    error: err.to_string(),
                });
            }
        }
    }

    info!(
        evacuation = %session.id,
        worksite = %session.worksite_id,
        created = report.created.len(),
        failed = report.failed.len(),
        "roster snapshot taken"
    );
    report
}

/// Which session a roster read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterSelector {
    /// The most recently created session, written `0` in paths.
    Latest,
    Session(Uuid),
}

impl FromStr for RosterSelector {
    type Err = EvacError;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim() {
            "0" => Ok(RosterSelector::Latest),
            other => Uuid::parse_str(other)
                .map(RosterSelector::Session)
                .map_err(|err| {
                    EvacError::DeserializationError(format!("invalid evacuation id {other}: {err}"))
                }),
        }
    }
}

/// Display-ready roster rows for a session. No sessions at all yields an empty roster.
pub async fn read_roster(storage: &dyn Storage, selector: RosterSelector) -> Result<Vec<RosterRow>> {
    let session_id = match selector {
        RosterSelector::Session(id) => id,
        RosterSelector::Latest => match storage.latest_session().await? {
            Some(session) => session.id,
            None => return Ok(Vec::new()),
        },
    };
    storage.roster_rows(session_id).await
}
