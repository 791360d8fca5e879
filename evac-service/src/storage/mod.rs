//! Storage contracts for the registry, scan and session collections.
//!
//! The service reaches storage only through these traits. Two backends are
//! provided: [`PgStorage`] for production and [`MemoryStorage`] for tests
//! and offline tooling. Neither caches; every call hits the backend.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evac_core::errors::Result;
use evac_protocol::evacuation::{EvacuationSession, NewRosterEntry, RosterEntry, RosterRow};
use evac_protocol::registry::{Site, TrackedAsset};
use evac_protocol::scan::{NewScanRecord, PresentAsset, ScanRecord};
use uuid::Uuid;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Read-only lookups against the site and asset registry.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Exact match on the site's external (feed network) identifier.
    async fn find_site_by_network(&self, network_id: &str) -> Result<Option<Site>>;

    async fn find_site(&self, site_id: Uuid) -> Result<Option<Site>>;

    /// Exact match on the asset's hardware address.
    async fn find_asset_by_mac(&self, mac_address: &str) -> Result<Option<TrackedAsset>>;
}

#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn insert_scan(&self, scan: NewScanRecord) -> Result<ScanRecord>;

    /// Latest scan per asset at a site, restricted to assigned assets seen at
    /// or after `seen_since`.
    async fn present_assets(
        &self,
        worksite_id: Uuid,
        seen_since: DateTime<Utc>,
    ) -> Result<Vec<PresentAsset>>;
}

/// Result of an atomic insert-if-idle on the session collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCreation {
    Created(EvacuationSession),
    AlreadyActive(Vec<EvacuationSession>),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates a session unless the site already has an active one.
    ///
    /// Implementations must perform the check and the insert atomically.
    async fn create_session_if_idle(
        &self,
        worksite_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<SessionCreation>;

    /// Sets the end timestamp. Already ended sessions are returned unchanged.
    async fn end_session(&self, session_id: Uuid, ended_at: DateTime<Utc>)
        -> Result<EvacuationSession>;

    /// Most recently created session across all sites.
    async fn latest_session(&self) -> Result<Option<EvacuationSession>>;

    async fn insert_roster_entry(&self, entry: NewRosterEntry) -> Result<RosterEntry>;

    /// Overwrites the arrival timestamp. `None` when the entry does not exist.
    async fn record_arrival(
        &self,
        entry_id: Uuid,
        arrival: DateTime<Utc>,
    ) -> Result<Option<RosterEntry>>;

    async fn roster_rows(&self, session_id: Uuid) -> Result<Vec<RosterRow>>;
}

/// Everything the service needs from a backend.
pub trait Storage: Registry + ScanStore + SessionStore {}

impl<T> Storage for T where T: Registry + ScanStore + SessionStore + ?Sized {}
