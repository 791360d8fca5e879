//! Evacuation tracking.
//!
//! Ingests location feed callbacks into per-device scan records and runs
//! evacuation sessions whose rosters are snapshotted from recent scans.
//!
//! * [`evac_core`]: configuration, error type, database pool and logging
//! * [`evac_protocol`]: feed envelope, scan and roster records
//! * [`evac_service`]: storage backends, ingestion pipeline and HTTP API

pub use evac_core;
pub use evac_protocol;
pub use evac_service;

pub use evac_core::{CoreConfig, EvacError};
pub use evac_protocol::prelude;
pub use evac_service::{build_router, start_service, AppState, MemoryStorage, PgStorage, ServiceSettings};
