//! vonat-tracker entry point.
//!
//! Bootstraps the database, then runs the ingestion scheduler and the
//! database file server until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use vonat_tracker::app_state::ServerState;
use vonat_tracker::config::TrackerConfig;
use vonat_tracker::error::TrackerError;
use vonat_tracker::persistence::Store;
use vonat_tracker::scheduler::Scheduler;
use vonat_tracker::server;
use vonat_tracker::upstream::TrainsClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = TrackerConfig::from_env()?;
    tracing::info!(db = %config.db_path.display(), "starting the train position data fetcher");

    if config.sync_url.is_some() || config.sync_auth_token.is_some() {
        tracing::warn!("DB_SYNC_URL/DB_SYNC_AUTH_TOKEN are set; this build writes locally only");
    }

    // Bootstrap storage
    let store = Store::connect(&config).await?;
    let schema = tokio::fs::read_to_string(&config.schema_path)
        .await
        .map_err(|source| TrackerError::Io {
            path: config.schema_path.clone(),
            source,
        })?;
    store.apply_schema(&schema).await?;

    let client = Arc::new(TrainsClient::new(&config)?);

    // One shutdown flag shared by the scheduler, the file server, and
    // the optional self-termination timer.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Database file server
    let state = ServerState::new(&config);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.file_server_port)).await?;
    tracing::info!(
        port = config.file_server_port,
        archive = %config.archive_name,
        "file server listening"
    );
    let mut server_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        let app = server::router(state);
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await;
        if let Err(error) = served {
            tracing::error!(%error, "file server terminated");
        }
    });

    // Optional self-termination
    if let Some(secs) = config.shutdown_after_secs {
        let tx = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            tracing::info!(after_secs = secs, "self-termination timer fired");
            let _ = tx.send(true);
        });
    }

    // Ctrl-C / SIGINT
    let tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; shutting down");
            let _ = tx.send(true);
        }
    });

    Scheduler::new(client, store, &config, shutdown_rx).run().await;

    tracing::info!("scheduler stopped; exiting");
    Ok(())
}
