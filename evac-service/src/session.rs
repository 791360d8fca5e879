//! Evacuation session lifecycle: Idle -> Active on creation, Active -> Idle on end.

use chrono::{DateTime, Utc};
use evac_core::errors::{EvacError, Result};
use evac_protocol::evacuation::{EvacuationSession, SnapshotReport};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::roster::snapshot_roster;
use crate::storage::{SessionCreation, Storage};

/// Response body for a session that was actually created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartedSession {
    pub session: EvacuationSession,
    pub roster: SnapshotReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStart {
    Started(StartedSession),
    /// The site was already Active; nothing was written.
    AlreadyActive(Vec<EvacuationSession>),
}

/// Opens a session for the site unless one is already active, then snapshots its roster.
pub async fn start_session(
    storage: &dyn Storage,
    worksite_id: Uuid,
    now: DateTime<Utc>,
) -> Result<SessionStart> {
    if storage.find_site(worksite_id).await?.is_none() {
        return Err(EvacError::NotFound(format!("worksite {worksite_id}")));
    }

    match storage.create_session_if_idle(worksite_id, now).await? {
        SessionCreation::AlreadyActive(active) => {
            info!(%worksite_id, active = active.len(), "evacuation already active");
            Ok(SessionStart::AlreadyActive(active))
        }
        SessionCreation::Created(session) => {
            info!(evacuation = %session.id, %worksite_id, "evacuation session created");
            let roster = snapshot_roster(storage, &session).await;
            Ok(SessionStart::Started(StartedSession { session, roster }))
        }
    }
}

/// Ends a session; ending an ended session returns it untouched.
pub async fn end_session(
    storage: &dyn Storage,
    session_id: Uuid,
    ended_at: DateTime<Utc>,
) -> Result<EvacuationSession> {
    let session = storage.end_session(session_id, ended_at).await?;
    info!(
        evacuation = %session.id,
        worksite = %session.worksite_id,
        end_date = ?session.end_date,
        "evacuation session ended"
    );
    Ok(session)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use evac_protocol::registry::Site;

    use super::*;
    use crate::storage::MemoryStorage;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 11, minute, 0).unwrap()
    }

    fn storage_with_site() -> (MemoryStorage, Site) {
        let storage = MemoryStorage::new();
        let site = Site {
            id: Uuid::new_v4(),
            external_id: "NET1".into(),
            name: "Plant".into(),
        };
        storage.add_site(site.clone());
        (storage, site)
    }

    #[tokio::test]
    async fn active_site_returns_existing_session_unchanged() {
        let (storage, site) = storage_with_site();
        let SessionStart::Started(first) = start_session(&storage, site.id, at(0)).await.unwrap()
        else {
            panic!("expected a new session");
        };

        let second = start_session(&storage, site.id, at(5)).await.unwrap();
        assert_eq!(second, SessionStart::AlreadyActive(vec![first.session]));
        assert_eq!(storage.sessions().len(), 1);
    }

    #[tokio::test]
    async fn unknown_site_is_not_found() {
        let storage = MemoryStorage::new();
        let err = start_session(&storage, Uuid::new_v4(), at(0)).await.unwrap_err();
        assert!(matches!(err, EvacError::NotFound(_)));
        assert!(storage.sessions().is_empty());
    }

    #[tokio::test]
    async fn ending_returns_site_to_idle() {
        let (storage, site) = storage_with_site();
        let SessionStart::Started(first) = start_session(&storage, site.id, at(0)).await.unwrap()
        else {
            panic!("expected a new session");
        };

        let ended = end_session(&storage, first.session.id, at(30)).await.unwrap();
        assert_eq!(ended.end_date, Some(at(30)));

        let next = start_session(&storage, site.id, at(31)).await.unwrap();
        assert!(matches!(next, SessionStart::Started(_)));
    }

    #[tokio::test]
    async fn concurrent_starts_create_one_session() {
        let (storage, site) = storage_with_site();
        let storage = Arc::new(storage);
        let site_id = site.id;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                start_session(storage.as_ref(), site_id, at(0)).await
            }));
        }

        let mut started = 0;
        for handle in handles {
            if let SessionStart::Started(_) = handle.await.unwrap().unwrap() {
                started += 1;
            }
        }
        assert_eq!(started, 1);
        assert_eq!(storage.sessions().len(), 1);
    }
}
