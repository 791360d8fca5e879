use std::sync::Arc;
use std::time::Duration;

use evac_core::errors::EvacError;
use evac_protocol::feed::{parse_feed, FeedError};
use evac_protocol::scan::ScanOutcome;
use thiserror::Error;
use tracing::info;

use crate::fanout::persist_observations;
use crate::resolver::{resolve_site, SiteResolutionError};
use crate::storage::Storage;

/// Batch-level rejections. Per-device problems never surface here.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("unknown network: {0}")]
    UnknownNetwork(String),
    #[error(transparent)]
    Storage(EvacError),
}

impl From<SiteResolutionError> for IngestError {
    fn from(err: SiteResolutionError) -> Self {
        match err {
            SiteResolutionError::UnknownNetwork(network_id) => IngestError::UnknownNetwork(network_id),
            SiteResolutionError::Storage(err) => IngestError::Storage(err),
        }
    }
}

/// Parses a raw feed callback and persists one scan per observed device.
///
/// Scans are stamped with the feed window's end time.
pub async fn ingest_feed(
    storage: Arc<dyn Storage>,
    raw: &[u8],
    deadline: Duration,
) -> Result<Vec<ScanOutcome>, IngestError> {
    let payload = parse_feed(raw)?;
    let data = &payload.data;
    let site = resolve_site(&*storage, &data.network_id).await?;

    let outcomes = persist_observations(
        storage,
        &site,
        &data.observations,
        data.end_time,
        deadline,
    )
    .await;

    info!(
        network_id = %data.network_id,
        worksite = %site.id,
        observations = data.observations.len(),
        stored = outcomes.iter().filter(|outcome| outcome.is_stored()).count(),
        "feed batch ingested"
    );
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use evac_protocol::registry::Site;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::storage::MemoryStorage;

    fn body(network_id: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "version": "3.0",
            "type": "BLE",
            "secret": "s",
            "data": {
                "networkId": network_id,
                "startTime": "2024-03-01T10:00:00Z",
                "endTime": "2024-03-01T10:01:00Z",
                "reportingAps": [],
                "observations": [{
                    "clientMac": "AA:BB:CC:DD:EE:FF",
                    "locations": [{ "lat": "40.71", "lng": 40.0, "time": "2024-03-01T10:00:30Z" }]
                }]
            }
        }))
        .expect("encode")
    }

    #[tokio::test]
    async fn unknown_network_rejects_whole_batch() {
        let storage = MemoryStorage::new();
        let err = ingest_feed(Arc::new(storage.clone()), &body("NET1"), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::UnknownNetwork(id) if id == "NET1"));
        assert!(storage.scans().is_empty());
    }

    #[tokio::test]
    async fn missing_network_id_is_distinct_from_malformed() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let missing = ingest_feed(storage.clone(), &body(""), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(missing, IngestError::Feed(FeedError::MissingNetworkId { .. })));

        let malformed = ingest_feed(storage, b"{not json", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(malformed, IngestError::Feed(FeedError::Malformed { .. })));
    }

    #[tokio::test]
    async fn stamps_scans_with_window_end() {
        let storage = MemoryStorage::new();
        let site = Site {
            id: Uuid::new_v4(),
            external_id: "NET1".into(),
            name: "Plant".into(),
        };
        storage.add_site(site.clone());

        let outcomes = ingest_feed(Arc::new(storage.clone()), &body("NET1"), Duration::from_secs(1))
            .await
            .expect("ingest");

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].worksite, site.id);
        assert_eq!(outcomes[0].latitude, Some(40.71));
        assert_eq!(
            outcomes[0].scanned_at.to_rfc3339(),
            "2024-03-01T10:01:00+00:00"
        );
        assert_eq!(storage.scans().len(), 1);
    }
}
