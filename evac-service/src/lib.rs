//! Location feed ingestion and evacuation roster service.

pub mod api;
pub mod arrival;
pub mod config;
pub mod error;
pub mod fanout;
pub mod ingest;
pub mod resolver;
pub mod roster;
pub mod session;
pub mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

pub use api::{build_router, AppState};
pub use config::{ServiceConfig, ServiceSettings};
pub use storage::{MemoryStorage, PgStorage, Storage};

/// Handle returned when the service is started programmatically.
pub struct ServiceHandle {
    pub addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
}

impl ServiceHandle {
    pub fn shutdown(self) {
        let _ = self.shutdown.send(());
    }
}

/// Binds `bind_address` and serves the API in the background until shut down.
pub async fn start_service(
    storage: Arc<dyn Storage>,
    settings: ServiceSettings,
    bind_address: &str,
) -> anyhow::Result<ServiceHandle> {
    let addr: SocketAddr = bind_address
        .parse()
        .context("invalid service bind address")?;
    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind service listener")?;
    let actual_addr = listener
        .local_addr()
        .context("failed to read socket address")?;
    info!(%actual_addr, "starting evac-service");

    let router = build_router(AppState::new(storage, settings));
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await
            .ok();
    });

    Ok(ServiceHandle {
        addr: actual_addr,
        shutdown: tx,
    })
}
