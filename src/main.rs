use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use counsel_notify::clock::SystemClock;
use counsel_notify::config::Settings;
use counsel_notify::postgres::PostgresPool;
use counsel_notify::server::{create_app, AppState};
use counsel_notify::store::create_store;
use counsel_notify::tasks::SweepTask;
use counsel_notify::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    // Connect PostgreSQL only when it backs the store
    let postgres_pool = if settings.store.backend == "postgres" {
        let pool = PostgresPool::new(&settings.database)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to connect to PostgreSQL"))?;
        if settings.database.run_migrations {
            pool.run_migrations().await?;
        }
        Some(Arc::new(pool))
    } else {
        None
    };

    let store = create_store(&settings.store, postgres_pool.clone())?;
    let state = AppState::new(
        settings.clone(),
        store,
        Arc::new(SystemClock),
        postgres_pool.clone(),
    );
    tracing::info!(backend = state.store.backend_name(), "Application state initialized");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start the dispatch and seeding sweeps in background
    let sweep_handle = if settings.engine.sweeps_enabled {
        let task = SweepTask::new(
            settings.engine.clone(),
            state.dispatcher.clone(),
            state.reminders.clone(),
            shutdown_tx.subscribe(),
        );
        Some(tokio::spawn(task.run()))
    } else {
        tracing::info!("In-process sweeps disabled, expecting external triggers");
        None
    };

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    // Wait for background tasks to finish
    tracing::info!("Waiting for background tasks to finish...");
    if let Some(handle) = sweep_handle {
        let _ = handle.await;
    }
    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop the sweep task
    let _ = shutdown_tx.send(());
}
