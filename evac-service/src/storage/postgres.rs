use async_trait::async_trait;
use chrono::{DateTime, Utc};
use evac_core::config::CoreConfig;
use evac_core::db::DatabasePool;
use evac_core::errors::{EvacError, Result};
use evac_protocol::evacuation::{EvacuationSession, NewRosterEntry, RosterEntry, RosterRow};
use evac_protocol::registry::{Site, TrackedAsset};
use evac_protocol::scan::{NewScanRecord, PresentAsset, ScanRecord};
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use super::{Registry, ScanStore, SessionCreation, SessionStore};

const CREATE_ATTEMPTS: usize = 3;

/// Postgres-backed storage for the registry, scans and evacuation sessions.
#[derive(Clone)]
pub struct PgStorage {
    pool: DatabasePool,
}

impl PgStorage {
    /// Connects to the database using the supplied configuration and ensures migrations ran.
    pub async fn from_config(config: &CoreConfig) -> Result<Self> {
        let pool = DatabasePool::connect(config).await?;
        Self::from_pool(pool).await
    }

    /// Builds the storage from an existing database pool.
    pub async fn from_pool(pool: DatabasePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(pool.inner()).await?;
        Ok(Self { pool })
    }

    async fn active_sessions(&self, worksite_id: Uuid) -> Result<Vec<EvacuationSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, worksite_id, created_at, end_date
            FROM evacuations
            WHERE worksite_id = $1 AND end_date IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(worksite_id)
        .fetch_all(self.pool.inner())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl Registry for PgStorage {
    async fn find_site_by_network(&self, network_id: &str) -> Result<Option<Site>> {
        let row = sqlx::query_as::<_, SiteRow>(
            "SELECT id, external_id, name FROM worksites WHERE external_id = $1",
        )
        .bind(network_id)
        .fetch_optional(self.pool.inner())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_site(&self, site_id: Uuid) -> Result<Option<Site>> {
        let row = sqlx::query_as::<_, SiteRow>(
            "SELECT id, external_id, name FROM worksites WHERE id = $1",
        )
        .bind(site_id)
        .fetch_optional(self.pool.inner())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_asset_by_mac(&self, mac_address: &str) -> Result<Option<TrackedAsset>> {
        let row = sqlx::query_as::<_, AssetRow>(
            "SELECT id, mac_address, assigned_to FROM beacons WHERE mac_address = $1",
        )
        .bind(mac_address)
        .fetch_optional(self.pool.inner())
        .await?;

        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl ScanStore for PgStorage {
    async fn insert_scan(&self, scan: NewScanRecord) -> Result<ScanRecord> {
        let row = sqlx::query_as::<_, ScanRow>(
            r#"
            INSERT INTO scanned_beacons (
                id, mac_address, worksite_id, beacon_id, latitude, longitude, scanned_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING
                id, mac_address, worksite_id, beacon_id, latitude, longitude,
                scanned_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&scan.mac_address)
        .bind(scan.worksite_id)
        .bind(scan.beacon_id)
        .bind(scan.latitude)
        .bind(scan.longitude)
        .bind(scan.scanned_at)
        .fetch_one(self.pool.inner())
        .await?;

        Ok(row.into())
    }

    async fn present_assets(
        &self,
        worksite_id: Uuid,
        seen_since: DateTime<Utc>,
    ) -> Result<Vec<PresentAsset>> {
        let rows = sqlx::query_as::<_, PresentAssetRow>(
            r#"
            SELECT beacon_id, assigned_to, last_seen
            FROM scanned_beacons_summary
            WHERE worksite_id = $1
              AND beacon_id IS NOT NULL
              AND assigned_to IS NOT NULL
              AND last_seen >= $2
            ORDER BY beacon_id
            "#,
        )
        .bind(worksite_id)
        .bind(seen_since)
        .fetch_all(self.pool.inner())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl SessionStore for PgStorage {
    async fn create_session_if_idle(
        &self,
        worksite_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<SessionCreation> {
        for attempt in 1..=CREATE_ATTEMPTS {
            // The partial unique index turns a concurrent second insert into a no-op.
            let inserted = sqlx::query_as::<_, SessionRow>(
                r#"
                INSERT INTO evacuations (id, worksite_id, created_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (worksite_id) WHERE end_date IS NULL DO NOTHING
                RETURNING id, worksite_id, created_at, end_date
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(worksite_id)
            .bind(created_at)
            .fetch_optional(self.pool.inner())
            .await?;

            if let Some(row) = inserted {
                return Ok(SessionCreation::Created(row.into()));
            }

            let active = self.active_sessions(worksite_id).await?;
            if !active.is_empty() {
                return Ok(SessionCreation::AlreadyActive(active));
            }

            debug!(%worksite_id, attempt, "active session ended while creating, retrying");
        }

        Err(EvacError::Conflict(format!(
            "worksite {worksite_id} kept changing state during session creation"
        )))
    }

    async fn end_session(
        &self,
        session_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<EvacuationSession> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE evacuations
            SET end_date = COALESCE(end_date, $2)
            WHERE id = $1
            RETURNING id, worksite_id, created_at, end_date
            "#,
        )
        .bind(session_id)
        .bind(ended_at)
        .fetch_optional(self.pool.inner())
        .await?;

        row.map(Into::into)
            .ok_or_else(|| EvacError::NotFound(format!("evacuation {session_id}")))
    }

    async fn latest_session(&self) -> Result<Option<EvacuationSession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, worksite_id, created_at, end_date
            FROM evacuations
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool.inner())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn insert_roster_entry(&self, entry: NewRosterEntry) -> Result<RosterEntry> {
        let row = sqlx::query_as::<_, RosterEntryRow>(
            r#"
            INSERT INTO evacuation_beacons (id, evacuation_id, beacon_id, assigned_to)
            VALUES ($1, $2, $3, $4)
            RETURNING id, evacuation_id, beacon_id, assigned_to, arrival, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.evacuation_id)
        .bind(entry.beacon_id)
        .bind(entry.assigned_to)
        .fetch_one(self.pool.inner())
        .await?;

        Ok(row.into())
    }

    async fn record_arrival(
        &self,
        entry_id: Uuid,
        arrival: DateTime<Utc>,
    ) -> Result<Option<RosterEntry>> {
        let row = sqlx::query_as::<_, RosterEntryRow>(
            r#"
            UPDATE evacuation_beacons
            SET arrival = $2
            WHERE id = $1
            RETURNING id, evacuation_id, beacon_id, assigned_to, arrival, created_at
            "#,
        )
        .bind(entry_id)
        .bind(arrival)
        .fetch_optional(self.pool.inner())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn roster_rows(&self, session_id: Uuid) -> Result<Vec<RosterRow>> {
        let rows = sqlx::query_as::<_, RosterRowRecord>(
            r#"
            SELECT
                eb.id,
                b.mac_address,
                eb.assigned_to,
                (p.first_name || ' ' || p.last_name) AS name,
                eb.arrival AS arrival_time,
                (t.name || '-' || p.kind) AS role,
                c.name AS company,
                eb.created_at AS created
            FROM evacuation_beacons eb
            INNER JOIN beacons b ON b.id = eb.beacon_id
            INNER JOIN people p ON p.id = eb.assigned_to
            INNER JOIN companies c ON c.id = p.company_id
            INNER JOIN teams t ON t.id = p.team_id
            WHERE eb.evacuation_id = $1
            ORDER BY eb.created_at, eb.id
            "#,
        )
        .bind(session_id)
        .fetch_all(self.pool.inner())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(FromRow)]
struct SiteRow {
    id: Uuid,
    external_id: String,
    name: String,
}

impl From<SiteRow> for Site {
    fn from(row: SiteRow) -> Self {
        Site {
            id: row.id,
            external_id: row.external_id,
            name: row.name,
        }
    }
}

#[derive(FromRow)]
struct AssetRow {
    id: Uuid,
    mac_address: String,
    assigned_to: Option<Uuid>,
}

impl From<AssetRow> for TrackedAsset {
    fn from(row: AssetRow) -> Self {
        TrackedAsset {
            id: row.id,
            mac_address: row.mac_address,
            assigned_to: row.assigned_to,
        }
    }
}

#[derive(FromRow)]
struct ScanRow {
    id: Uuid,
    mac_address: String,
    worksite_id: Uuid,
    beacon_id: Option<Uuid>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    scanned_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<ScanRow> for ScanRecord {
    fn from(row: ScanRow) -> Self {
        ScanRecord {
            id: row.id,
            mac_address: row.mac_address,
            worksite_id: row.worksite_id,
            beacon_id: row.beacon_id,
            latitude: row.latitude,
            longitude: row.longitude,
            scanned_at: row.scanned_at,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct PresentAssetRow {
    beacon_id: Uuid,
    assigned_to: Uuid,
    last_seen: DateTime<Utc>,
}

impl From<PresentAssetRow> for PresentAsset {
    fn from(row: PresentAssetRow) -> Self {
        PresentAsset {
            beacon_id: row.beacon_id,
            assigned_to: row.assigned_to,
            last_seen: row.last_seen,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    worksite_id: Uuid,
    created_at: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
}

impl From<SessionRow> for EvacuationSession {
    fn from(row: SessionRow) -> Self {
        EvacuationSession {
            id: row.id,
            worksite_id: row.worksite_id,
            created_at: row.created_at,
            end_date: row.end_date,
        }
    }
}

#[derive(FromRow)]
struct RosterEntryRow {
    id: Uuid,
    evacuation_id: Uuid,
    beacon_id: Uuid,
    assigned_to: Uuid,
    arrival: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<RosterEntryRow> for RosterEntry {
    fn from(row: RosterEntryRow) -> Self {
        RosterEntry {
            id: row.id,
            evacuation_id: row.evacuation_id,
            beacon_id: row.beacon_id,
            assigned_to: row.assigned_to,
            arrival: row.arrival,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct RosterRowRecord {
    id: Uuid,
    mac_address: String,
    assigned_to: Uuid,
    name: String,
    arrival_time: Option<DateTime<Utc>>,
    role: String,
    company: String,
    created: DateTime<Utc>,
}

impl From<RosterRowRecord> for RosterRow {
    fn from(row: RosterRowRecord) -> Self {
        RosterRow {
            id: row.id,
            mac_address: row.mac_address,
            assigned_to: row.assigned_to,
            name: row.name,
            arrival_time: row.arrival_time,
            role: row.role,
            company: row.company,
            created: row.created,
        }
    }
}
