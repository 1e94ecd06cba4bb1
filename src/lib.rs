//! Poll service with a vote ledger that keeps per-option counters equal to the
//! stored votes.
//!
//! The core lives in [`poll`] (creation and expiry), [`ledger`] (casting votes) and
//! [`tally`] (reading results). Each takes the current time from the caller, so
//! expiry is evaluated per call and never cached. The HTTP surface in [`routes`] and
//! [`handlers`] is a thin mapping over those operations.

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;
use tracing::{error, info};

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod poll;
pub mod routes;
pub mod state;
pub mod tally;

use config::Config;
use state::AppState;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub async fn run(config: Config) -> Result<(), BoxError> {
    info!("Connecting to database...");
    let pool = db::create_pool(&config.database).await?;
    db::migrate(&pool).await?;

    let state = AppState::new(pool.clone(), config.limits.clone());
    let app = routes::create_router(state, config.request_timeout);

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    info!("Server running on {address}");
    axum_server::bind(address)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    pool.close().await;
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
