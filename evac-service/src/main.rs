use std::net::SocketAddr;
use std::sync::Arc;

use evac_core::logging::{init_tracing, LogFormat};
use evac_service::error::ServerError;
use evac_service::{build_router, AppState, PgStorage, ServiceConfig};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = ServiceConfig::from_env()?;
    if let Err(err) = init_tracing(None, LogFormat::for_config(&config.core)) {
        eprintln!("failed to initialise tracing: {err}");
    }

    let addr: SocketAddr = config.bind_address().parse()?;

    let storage = PgStorage::from_config(&config.core).await?;
    let state = AppState::new(Arc::new(storage), config.settings.clone());
    let app = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;
    info!(
        %actual_addr,
        node = %config.core.node_name,
        environment = ?config.core.environment,
        "starting evac-service"
    );

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(?err, "evac-service terminated with error");
        return Err(err.into());
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
