//! dpusage API Server
//!
//! Serves the usage dashboard page and its JSON API.

use dpusage_api::{router, ApiConfig, AppState};
use dpusage_storage::{LocalSqliteBackend, WarehouseBackend};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ApiConfig::from_env();
    config.validate()?;

    tracing::info!(
        path = ?config.warehouse.path,
        database = %config.warehouse.database_name,
        read_only = config.warehouse.read_only,
        "Using warehouse"
    );

    let backend = LocalSqliteBackend::from_config(&config.warehouse);

    // Check if warehouse exists
    if !backend.exists()? {
        tracing::warn!("Warehouse does not exist, initializing an empty one");
        backend.initialize()?;
    }

    let state = AppState::new(backend, &config);
    let app = router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("dpusage API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
