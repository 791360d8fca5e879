//! Concurrent persistence of one ingestion batch.
//!
//! Every observation becomes an independent task that resolves its asset and
//! writes its scan record. Tasks report through a single completion channel
//! and the caller drains it until every task has answered or the deadline
//! passes. Whatever happens, the caller gets exactly one [`ScanOutcome`] per
//! observation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use evac_protocol::feed::Observation;
use evac_protocol::registry::Site;
use evac_protocol::scan::{NewScanRecord, ScanOutcome, ScanStatus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, warn};

use crate::resolver::{resolve_asset, AssetResolution};
use crate::storage::Storage;

const TIMED_OUT: &str = "scan persistence deadline exceeded";
const ABORTED: &str = "scan worker stopped without reporting";

/// Persists one scan per observation and returns one outcome per observation.
///
/// Outcome order follows completion order, not input order.
pub async fn persist_observations(
    storage: Arc<dyn Storage>,
    site: &Site,
    observations: &[Observation],
    scanned_at: DateTime<Utc>,
    deadline: Duration,
) -> Vec<ScanOutcome> {
    let total = observations.len();
    if total == 0 {
        return Vec::new();
    }

    let deadline_at = Instant::now() + deadline;
    let (tx, mut rx) = mpsc::channel::<(usize, ScanOutcome)>(total);
    let mut pending: Vec<Option<NewScanRecord>> = Vec::with_capacity(total);
    let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(total);

    for (index, observation) in observations.iter().enumerate() {
        let record = NewScanRecord::from_observation(observation, site.id, scanned_at);
        pending.push(Some(record.clone()));

        let storage = storage.clone();
        let tx = tx.clone();
        workers.push(tokio::spawn(async move {
            let outcome = persist_one(storage.as_ref(), record).await;
            // The receiver only goes away once the deadline has passed.
            let _ = tx.send((index, outcome)).await;
        }));
    }
    drop(tx);

    let mut outcomes = Vec::with_capacity(total);
    let mut expired = false;
    while outcomes.len() < total {
        match timeout_at(deadline_at, rx.recv()).await {
            Ok(Some((index, outcome))) => settle(&mut pending, &mut outcomes, index, outcome),
            // Every sender is gone, so the missing workers died before reporting.
            Ok(None) => break,
            Err(_) => {
                expired = true;
                break;
            }
        }
    }

    if expired {
        // Workers that finished while the timer fired have already written.
        drain_ready(&mut rx, &mut pending, &mut outcomes);
        for worker in &workers {
            worker.abort();
        }
    }

    for record in pending.into_iter().flatten() {
        let outcome = if expired {
            warn!(mac_address = %record.mac_address, "scan persistence timed out");
            ScanOutcome::failed(&record, ScanStatus::TimedOut, TIMED_OUT)
        } else {
            error!(mac_address = %record.mac_address, "scan worker aborted");
            ScanOutcome::failed(&record, ScanStatus::Failed, ABORTED)
        };
        outcomes.push(outcome);
    }

    debug!(
        worksite = %site.id,
        total,
        stored = outcomes.iter().filter(|outcome| outcome.is_stored()).count(),
        "scan batch drained"
    );
    outcomes
}

fn drain_ready(
    rx: &mut mpsc::Receiver<(usize, ScanOutcome)>,
    pending: &mut [Option<NewScanRecord>],
    outcomes: &mut Vec<ScanOutcome>,
) {
    while let Ok((index, outcome)) = rx.try_recv() {
        settle(pending, outcomes, index, outcome);
    }
}

fn settle(
    pending: &mut [Option<NewScanRecord>],
    outcomes: &mut Vec<ScanOutcome>,
    index: usize,
    outcome: ScanOutcome,
) {
    if let Some(slot) = pending.get_mut(index) {
        *slot = None;
    }
    outcomes.push(outcome);
}

async fn persist_one(storage: &dyn Storage, mut record: NewScanRecord) -> ScanOutcome {
    let resolution = resolve_asset(storage, &record.mac_address).await;
    record.beacon_id = resolution.asset_id();
    let warning = match resolution {
        AssetResolution::LookupFailed(message) => Some(format!("asset lookup failed: {message}")),
        AssetResolution::Found(_) | AssetResolution::Unregistered => None,
    };

    match storage.insert_scan(record.clone()).await {
        Ok(stored) => ScanOutcome::stored(&stored, warning),
        Err(err) => {
            warn!(mac_address = %record.mac_address, error = %err, "failed to store scan");
            ScanOutcome::failed(&record, ScanStatus::Failed, err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use evac_core::errors::{EvacError, Result};
    use evac_protocol::evacuation::{EvacuationSession, NewRosterEntry, RosterEntry, RosterRow};
    use evac_protocol::feed::{Coordinate, Location};
    use evac_protocol::registry::TrackedAsset;
    use evac_protocol::scan::{PresentAsset, ScanRecord};
    use uuid::Uuid;

    use super::*;
    use crate::storage::{MemoryStorage, Registry, ScanStore, SessionCreation, SessionStore};

    /// Wraps the memory backend and misbehaves for chosen hardware addresses.
    struct Faulty {
        inner: MemoryStorage,
        lookup_fails: HashSet<String>,
        insert_fails: HashSet<String>,
        insert_hangs: HashSet<String>,
        insert_panics: HashSet<String>,
    }

    impl Faulty {
        fn new(inner: MemoryStorage) -> Self {
            Self {
                inner,
                lookup_fails: HashSet::new(),
                insert_fails: HashSet::new(),
                insert_hangs: HashSet::new(),
                insert_panics: HashSet::new(),
            }
        }
    }

    #[async_trait]
    impl Registry for Faulty {
        async fn find_site_by_network(&self, network_id: &str) -> Result<Option<Site>> {
            self.inner.find_site_by_network(network_id).await
        }

        async fn find_site(&self, site_id: Uuid) -> Result<Option<Site>> {
            self.inner.find_site(site_id).await
        }

        async fn find_asset_by_mac(&self, mac_address: &str) -> Result<Option<TrackedAsset>> {
            if self.lookup_fails.contains(mac_address) {
                return Err(EvacError::StorageError("registry unreachable".into()));
            }
            self.inner.find_asset_by_mac(mac_address).await
        }
    }

    #[async_trait]
    impl ScanStore for Faulty {
        async fn insert_scan(&self, scan: NewScanRecord) -> Result<ScanRecord> {
            if self.insert_panics.contains(&scan.mac_address) {
                panic!("driver bug");
            }
            if self.insert_hangs.contains(&scan.mac_address) {
                std::future::pending::<()>().await;
            }
            if self.insert_fails.contains(&scan.mac_address) {
                return Err(EvacError::StorageError("write rejected".into()));
            }
            self.inner.insert_scan(scan).await
        }

        async fn present_assets(
            &self,
            worksite_id: Uuid,
            seen_since: DateTime<Utc>,
        ) -> Result<Vec<PresentAsset>> {
            self.inner.present_assets(worksite_id, seen_since).await
        }
    }

    #[async_trait]
    impl SessionStore for Faulty {
        async fn create_session_if_idle(
            &self,
            worksite_id: Uuid,
            created_at: DateTime<Utc>,
        ) -> Result<SessionCreation> {
            self.inner.create_session_if_idle(worksite_id, created_at).await
        }

        async fn end_session(
            &self,
            session_id: Uuid,
            ended_at: DateTime<Utc>,
        ) -> Result<EvacuationSession> {
            self.inner.end_session(session_id, ended_at).await
        }

        async fn latest_session(&self) -> Result<Option<EvacuationSession>> {
            self.inner.latest_session().await
        }

        async fn insert_roster_entry(&self, entry: NewRosterEntry) -> Result<RosterEntry> {
            self.inner.insert_roster_entry(entry).await
        }

        async fn record_arrival(
            &self,
            entry_id: Uuid,
            arrival: DateTime<Utc>,
        ) -> Result<Option<RosterEntry>> {
            self.inner.record_arrival(entry_id, arrival).await
        }

        async fn roster_rows(&self, session_id: Uuid) -> Result<Vec<RosterRow>> {
            self.inner.roster_rows(session_id).await
        }
    }

    fn site() -> Site {
        Site {
            id: Uuid::new_v4(),
            external_id: "NET1".into(),
            name: "Plant".into(),
        }
    }

    fn observation(mac: &str, fixes: Vec<(Coordinate, Coordinate)>) -> Observation {
        Observation {
            client_mac: mac.into(),
            locations: fixes
                .into_iter()
                .map(|(lat, lng)| Location {
                    lat,
                    lng,
                    ..Location::default()
                })
                .collect(),
            ..Observation::default()
        }
    }

    fn scanned_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 1, 0).unwrap()
    }

    fn memory_with(site: &Site) -> MemoryStorage {
        let storage = MemoryStorage::new();
        storage.add_site(site.clone());
        storage
    }

    fn by_mac<'a>(outcomes: &'a [ScanOutcome], mac: &str) -> &'a ScanOutcome {
        outcomes
            .iter()
            .find(|outcome| outcome.mac_address == mac)
            .expect("outcome for every device")
    }

    #[tokio::test]
    async fn stores_latest_fix_and_links_known_assets() {
        let site = site();
        let storage = memory_with(&site);
        let asset = TrackedAsset {
            id: Uuid::new_v4(),
            mac_address: "AA".into(),
            assigned_to: None,
        };
        storage.add_asset(asset.clone());

        let observations = vec![
            observation(
                "AA",
                vec![(1.0_f64.into(), 2.0_f64.into()), ("40.71".into(), 40.0_f64.into())],
            ),
            observation("BB", vec![]),
        ];
        let outcomes = persist_observations(
            Arc::new(storage.clone()),
            &site,
            &observations,
            scanned_at(),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        let known = by_mac(&outcomes, "AA");
        assert!(known.is_stored());
        assert_eq!(known.beacon, Some(asset.id));
        assert_eq!(known.latitude, Some(40.71));
        assert_eq!(known.longitude, Some(40.0));
        assert_eq!(known.scanned_at, scanned_at());

        let anonymous = by_mac(&outcomes, "BB");
        assert!(anonymous.is_stored());
        assert_eq!(anonymous.beacon, None);
        assert_eq!(anonymous.latitude, None);
        assert_eq!(storage.scans().len(), 2);
    }

    #[tokio::test]
    async fn zero_coordinate_leaves_position_unknown() {
        let site = site();
        let storage = memory_with(&site);
        let observations = vec![observation("CC", vec![("NaN".into(), 12.5_f64.into())])];

        let outcomes = persist_observations(
            Arc::new(storage),
            &site,
            &observations,
            scanned_at(),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(outcomes[0].latitude, None);
        assert_eq!(outcomes[0].longitude, None);
    }

    // Asset lookup faults are tolerated per device: the scan is kept without
    // linkage and the outcome carries a warning instead of failing the batch.
    #[tokio::test]
    async fn asset_lookup_fault_stores_scan_with_warning() {
        let site = site();
        let mut faulty = Faulty::new(memory_with(&site));
        faulty.lookup_fails.insert("DD".into());

        let outcomes = persist_observations(
            Arc::new(faulty),
            &site,
            &[observation("DD", vec![])],
            scanned_at(),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_stored());
        assert_eq!(outcomes[0].beacon, None);
        assert!(outcomes[0]
            .warning
            .as_deref()
            .is_some_and(|warning| warning.contains("registry unreachable")));
    }

    #[tokio::test]
    async fn write_failure_is_reported_per_device() {
        let site = site();
        let mut faulty = Faulty::new(memory_with(&site));
        faulty.insert_fails.insert("EE".into());

        let outcomes = persist_observations(
            Arc::new(faulty),
            &site,
            &[observation("EE", vec![]), observation("FF", vec![])],
            scanned_at(),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(by_mac(&outcomes, "EE").status, ScanStatus::Failed);
        assert!(by_mac(&outcomes, "FF").is_stored());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_reports_stuck_writes_as_timed_out() {
        let site = site();
        let mut faulty = Faulty::new(memory_with(&site));
        faulty.insert_hangs.insert("GG".into());

        let outcomes = persist_observations(
            Arc::new(faulty),
            &site,
            &[observation("GG", vec![]), observation("HH", vec![])],
            scanned_at(),
            Duration::from_millis(200),
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        let stuck = by_mac(&outcomes, "GG");
        assert_eq!(stuck.status, ScanStatus::TimedOut);
        assert_eq!(stuck.error.as_deref(), Some(TIMED_OUT));
        assert!(by_mac(&outcomes, "HH").is_stored());
    }

    #[tokio::test]
    async fn panicking_worker_is_reported_as_failed() {
        let site = site();
        let mut faulty = Faulty::new(memory_with(&site));
        faulty.insert_panics.insert("II".into());

        let outcomes = persist_observations(
            Arc::new(faulty),
            &site,
            &[observation("II", vec![]), observation("JJ", vec![])],
            scanned_at(),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        let crashed = by_mac(&outcomes, "II");
        assert_eq!(crashed.status, ScanStatus::Failed);
        assert_eq!(crashed.error.as_deref(), Some(ABORTED));
        assert!(by_mac(&outcomes, "JJ").is_stored());
    }

    #[tokio::test]
    async fn empty_batch_yields_no_outcomes() {
        let site = site();
        let outcomes = persist_observations(
            Arc::new(memory_with(&site)),
            &site,
            &[],
            scanned_at(),
            Duration::from_secs(5),
        )
        .await;
        assert!(outcomes.is_empty());
    }

    #[test]
    fn completions_queued_at_the_deadline_are_kept() {
        let site = site();
        let records: Vec<NewScanRecord> = ["JJ", "KK"]
            .iter()
            .map(|mac| NewScanRecord::from_observation(&observation(mac, vec![]), site.id, scanned_at()))
            .collect();
        let mut pending: Vec<Option<NewScanRecord>> = records.iter().cloned().map(Some).collect();
        let mut outcomes = Vec::new();

        let (tx, mut rx) = mpsc::channel(2);
        let stored = ScanRecord {
            id: Uuid::new_v4(),
            mac_address: "JJ".into(),
            worksite_id: site.id,
            beacon_id: None,
            latitude: None,
            longitude: None,
            scanned_at: scanned_at(),
            created_at: scanned_at(),
        };
        tx.try_send((0, ScanOutcome::stored(&stored, None))).unwrap();

        drain_ready(&mut rx, &mut pending, &mut outcomes);

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_stored());
        assert!(pending[0].is_none());
        assert_eq!(pending[1].as_ref().map(|record| record.mac_address.as_str()), Some("KK"));
    }
}
