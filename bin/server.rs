// ezmoney - Web Server
// REST API with Axum

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ezmoney::{api, AnalyticsOutbox, AnomalyDetector, Config, FinanceService, SqliteStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ezmoney=debug,tower_http=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        error!("server stopped: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::load()?;

    // A missing or corrupt model is fatal: refuse to start
    let detector = AnomalyDetector::load(&config.model.artifact_path)
        .context("Failed to load anomaly model")?;

    let store = SqliteStore::open(&config.storage.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.storage.database_path))?;
    info!(path = ?config.storage.database_path, "database opened");

    let service = FinanceService::new(Arc::new(store), detector, Arc::new(AnalyticsOutbox::new()))
        .with_buffering(config.analytics.buffer_results);

    let app = api::router(service);

    let listener = tokio::net::TcpListener::bind(config.server.address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.address))?;

    info!(address = %config.server.address, "ezmoney server listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
