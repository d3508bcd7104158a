// Redemption Tracker - Web Server
// REST API with Axum + nightly redemption reset

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use redemption_tracker::{
    api, config, scheduler::ResetScheduler, AppConfig, CardRepository, JsonFileStore,
    ServerConfig, SystemClock,
};

/// Credit card redemption tracker API server
#[derive(Parser)]
#[command(name = "redemption-server", version, about)]
struct Args {
    #[command(flatten)]
    app: AppConfig,

    #[command(flatten)]
    server: ServerConfig,
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    config::init_logging(&args.app)?;

    tracing::info!(
        version = redemption_tracker::VERSION,
        data_file = %args.app.data_file.display(),
        "starting redemption tracker server"
    );

    // Load cards and run the startup reset
    let store = Arc::new(JsonFileStore::new(&args.app.data_file));
    let repo = Arc::new(CardRepository::open(store, Arc::new(SystemClock)));

    let scheduler = ResetScheduler::spawn(repo.clone());
    let app = api::router(repo);

    let addr = args.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("server running on http://{}", addr);
    tracing::info!("API: http://{}/api/creditcards", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    scheduler.shutdown().await;
    tracing::info!("server shutdown complete");

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
