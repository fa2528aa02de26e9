//! seedfill director binary.
//!
//! Bootstraps the service: configuration, tracing, the state store
//! connection, the reconcile worker, and the health probe server.

use std::sync::Arc;

use anyhow::Result;
use seedfill_director::{
    api,
    config::Config,
    liveness::LivenessLatch,
    state::AppState,
    store::PgStateStore,
    telemetry::TelemetryClient,
    worker::ReconcileWorker,
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to SEEDFILL_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting seedfill director");
    info!(
        listen_addr = %config.listen_addr,
        reconcile_interval_secs = config.reconcile_interval.as_secs(),
        "Configuration loaded"
    );

    // Connect to the state store
    let store = match PgStateStore::connect(&config.store).await {
        Ok(store) => {
            info!("State store connection established");
            store
        }
        Err(e) => {
            error!(error = %e, "Failed to connect to state store");
            return Err(e.into());
        }
    };

    // Run migrations in dev mode
    if config.dev_mode {
        info!("Running database migrations (dev mode)");
        if let Err(e) = store.run_migrations().await {
            error!(error = %e, "Failed to run migrations");
            return Err(e.into());
        }
    }

    // Liveness latch shared between the worker and the health probe
    let liveness = LivenessLatch::new();

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start the reconcile worker in background
    let worker = ReconcileWorker::new(
        Arc::new(store),
        Arc::new(TelemetryClient::new(config.telemetry.clone())),
        config.reconcile_interval,
        liveness.clone(),
    );
    let worker_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            worker.run(shutdown_rx).await;
        }
    });

    // Build and run the health probe server
    let state = AppState::new(liveness);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    // Signal shutdown to the worker
    let _ = shutdown_tx.send(true);

    info!("Waiting for reconcile worker to shut down...");
    let shutdown_timeout = std::time::Duration::from_secs(10);

    if let Err(e) = tokio::time::timeout(shutdown_timeout, worker_handle).await {
        warn!(error = %e, "Reconcile worker did not shut down in time");
    }

    info!("Director shutdown complete");
    Ok(())
}
