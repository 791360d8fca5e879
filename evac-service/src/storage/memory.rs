use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evac_core::errors::{EvacError, Result};
use evac_protocol::evacuation::{EvacuationSession, NewRosterEntry, RosterEntry, RosterRow};
use evac_protocol::registry::{Company, Person, Site, Team, TrackedAsset};
use evac_protocol::scan::{NewScanRecord, PresentAsset, ScanRecord};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{Registry, ScanStore, SessionCreation, SessionStore};

#[derive(Default)]
struct State {
    sites: HashMap<Uuid, Site>,
    companies: HashMap<Uuid, Company>,
    teams: HashMap<Uuid, Team>,
    people: HashMap<Uuid, Person>,
    assets: HashMap<Uuid, TrackedAsset>,
    scans: Vec<ScanRecord>,
    sessions: Vec<EvacuationSession>,
    roster: Vec<RosterEntry>,
}

/// In-process storage backend holding every collection behind one lock.
#[derive(Default, Clone)]
pub struct MemoryStorage {
    inner: Arc<RwLock<State>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_site(&self, site: Site) {
        self.inner.write().sites.insert(site.id, site);
    }

    pub fn add_company(&self, company: Company) {
        self.inner.write().companies.insert(company.id, company);
    }

    pub fn add_team(&self, team: Team) {
        self.inner.write().teams.insert(team.id, team);
    }

    pub fn add_person(&self, person: Person) {
        self.inner.write().people.insert(person.id, person);
    }

    pub fn add_asset(&self, asset: TrackedAsset) {
        self.inner.write().assets.insert(asset.id, asset);
    }

    /// Appends a scan directly, bypassing ingestion.
    pub fn record_scan(&self, scan: ScanRecord) {
        self.inner.write().scans.push(scan);
    }

    /// Stored scans in insertion order.
    pub fn scans(&self) -> Vec<ScanRecord> {
        self.inner.read().scans.clone()
    }

    /// Stored sessions in creation order.
    pub fn sessions(&self) -> Vec<EvacuationSession> {
        self.inner.read().sessions.clone()
    }

    pub fn roster_entries(&self) -> Vec<RosterEntry> {
        self.inner.read().roster.clone()
    }
}

#[async_trait]
impl Registry for MemoryStorage {
    async fn find_site_by_network(&self, network_id: &str) -> Result<Option<Site>> {
        let inner = self.inner.read();
        Ok(inner
            .sites
            .values()
            .find(|site| site.external_id == network_id)
            .cloned())
    }

    async fn find_site(&self, site_id: Uuid) -> Result<Option<Site>> {
        Ok(self.inner.read().sites.get(&site_id).cloned())
    }

    async fn find_asset_by_mac(&self, mac_address: &str) -> Result<Option<TrackedAsset>> {
        let inner = self.inner.read();
        Ok(inner
            .assets
            .values()
            .find(|asset| asset.mac_address == mac_address)
            .cloned())
    }
}

#[async_trait]
impl ScanStore for MemoryStorage {
    async fn insert_scan(&self, scan: NewScanRecord) -> Result<ScanRecord> {
        let mut inner = self.inner.write();
        if !inner.sites.contains_key(&scan.worksite_id) {
            return Err(EvacError::StorageError(format!(
                "worksite {} does not exist",
                scan.worksite_id
            )));
        }

        let record = ScanRecord {
            id: Uuid::new_v4(),
            mac_address: scan.mac_address,
            worksite_id: scan.worksite_id,
            beacon_id: scan.beacon_id,
            latitude: scan.latitude,
            longitude: scan.longitude,
            scanned_at: scan.scanned_at,
            created_at: Utc::now(),
        };
        inner.scans.push(record.clone());
        Ok(record)
    }

    async fn present_assets(
        &self,
        worksite_id: Uuid,
        seen_since: DateTime<Utc>,
    ) -> Result<Vec<PresentAsset>> {
        let inner = self.inner.read();
        let mut latest: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
        for scan in inner.scans.iter().filter(|scan| scan.worksite_id == worksite_id) {
            if let Some(beacon_id) = scan.beacon_id {
                let seen = latest.entry(beacon_id).or_insert(scan.scanned_at);
                if scan.scanned_at > *seen {
                    *seen = scan.scanned_at;
                }
            }
        }

        let mut present: Vec<PresentAsset> = latest
            .into_iter()
            .filter(|(_, last_seen)| *last_seen >= seen_since)
            .filter_map(|(beacon_id, last_seen)| {
                let assigned_to = inner.assets.get(&beacon_id)?.assigned_to?;
                Some(PresentAsset {
                    beacon_id,
                    assigned_to,
                    last_seen,
                })
            })
            .collect();
        present.sort_by_key(|asset| asset.beacon_id);
        Ok(present)
    }
}

#[async_trait]
impl SessionStore for MemoryStorage {
    async fn create_session_if_idle(
        &self,
        worksite_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<SessionCreation> {
        let mut inner = self.inner.write();
        let active: Vec<EvacuationSession> = inner
            .sessions
            .iter()
            .filter(|session| session.worksite_id == worksite_id && session.is_active())
            .cloned()
            .collect();
        if !active.is_empty() {
            return Ok(SessionCreation::AlreadyActive(active));
        }

        let session = EvacuationSession::new(worksite_id, created_at);
        inner.sessions.push(session.clone());
        Ok(SessionCreation::Created(session))
    }

    async fn end_session(
        &self,
        session_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<EvacuationSession> {
        let mut inner = self.inner.write();
        let session = inner
            .sessions
            .iter_mut()
            .find(|session| session.id == session_id)
            .ok_or_else(|| EvacError::NotFound(format!("evacuation {session_id}")))?;

        if session.end_date.is_none() {
            session.end_date = Some(ended_at);
        }
        Ok(session.clone())
    }

    async fn latest_session(&self) -> Result<Option<EvacuationSession>> {
        let inner = self.inner.read();
        // Later insertions win ties on created_at.
        Ok(inner
            .sessions
            .iter()
            .max_by_key(|session| session.created_at)
            .cloned())
    }

    async fn insert_roster_entry(&self, entry: NewRosterEntry) -> Result<RosterEntry> {
        let mut inner = self.inner.write();
        let duplicate = inner.roster.iter().any(|existing| {
            existing.evacuation_id == entry.evacuation_id && existing.beacon_id == entry.beacon_id
        });
        if duplicate {
            return Err(EvacError::Conflict(format!(
                "beacon {} already on roster of evacuation {}",
                entry.beacon_id, entry.evacuation_id
            )));
        }

        let created = RosterEntry {
            id: Uuid::new_v4(),
            evacuation_id: entry.evacuation_id,
            beacon_id: entry.beacon_id,
            assigned_to: entry.assigned_to,
            arrival: None,
            created_at: Utc::now(),
        };
        inner.roster.push(created.clone());
        Ok(created)
    }

    async fn record_arrival(
        &self,
        entry_id: Uuid,
        arrival: DateTime<Utc>,
    ) -> Result<Option<RosterEntry>> {
        let mut inner = self.inner.write();
        Ok(inner
            .roster
            .iter_mut()
            .find(|entry| entry.id == entry_id)
            .map(|entry| {
                entry.arrival = Some(arrival);
                entry.clone()
            }))
    }

    async fn roster_rows(&self, session_id: Uuid) -> Result<Vec<RosterRow>> {
        let inner = self.inner.read();
        let rows = inner
            .roster
            .iter()
            .filter(|entry| entry.evacuation_id == session_id)
            .filter_map(|entry| {
                let asset = inner.assets.get(&entry.beacon_id)?;
                let person = inner.people.get(&entry.assigned_to)?;
                let company = inner.companies.get(&person.company_id)?;
                let team = inner.teams.get(&person.team_id)?;
                Some(RosterRow {
                    id: entry.id,
                    mac_address: asset.mac_address.clone(),
                    assigned_to: entry.assigned_to,
                    name: person.display_name(),
                    arrival_time: entry.arrival,
                    role: format!("{}-{}", team.name, person.kind),
                    company: company.name.clone(),
                    created: entry.created_at,
                })
            })
            .collect();
        Ok(rows)
    }
}
