//! eCFR Analyzer REST API server
//!
//! Usage:
//!   DATABASE_URL="postgresql:///ecfr" cargo run --bin ecfr_server --features server

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ecfr_analyzer::api::{create_router, AppState};
use ecfr_analyzer::config::{mask_database_url, ServerConfig};
use ecfr_analyzer::database::DatabaseManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ecfr_analyzer=info,tower_http=debug")),
        )
        .init();

    let config = ServerConfig::from_env();
    info!(
        database = %mask_database_url(&config.database.database_url),
        search_limit = config.search_limit,
        cors_any = config.cors_any,
        "Starting eCFR analyzer"
    );

    let db = DatabaseManager::new(config.database.clone())
        .await
        .context("Failed to connect to database")?;
    db.test_connection()
        .await
        .context("Database connectivity check failed")?;

    let missing = db.missing_tables().await?;
    if !missing.is_empty() {
        warn!("Serving with missing tables: {}", missing.join(", "));
    }

    let state = AppState::with_config(Arc::new(db.regulation_store()), &config);
    let app = create_router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);
    info!("{}", db.connection_stats());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
