use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use littlelemon_rs::{
    config::StorageBackend,
    create_app,
    handlers::seed_demo_data,
    init_observability,
    repositories::InMemoryStore,
    shutdown_observability, Config, Metrics, Repositories,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_environment().context("Failed to load configuration")?;

    init_observability(&config.observability).context("Failed to initialize observability")?;

    info!(
        "Starting {} v{}",
        config.observability.service_name, config.observability.service_version
    );

    let metrics = Arc::new(Metrics::new()?);

    let repositories = match config.database.storage_backend {
        StorageBackend::Memory => {
            info!("Using the in-memory store");
            Repositories::in_memory(Arc::new(InMemoryStore::new()))
        }
        StorageBackend::Dynamodb => {
            info!(
                region = %config.database.region,
                tables = ?config.database.table_names(),
                "Using DynamoDB"
            );
            let client = Arc::new(config.database.dynamodb_client().await);
            Repositories::dynamodb(client, &config.database, metrics.clone())
        }
    };

    if config.database.seed_demo_data {
        if let Some(table_manager) = &repositories.table_manager {
            table_manager
                .create_all_tables(&config.database)
                .await
                .context("Failed to create tables")?;
        }
        let summary = seed_demo_data(repositories.users.as_ref(), repositories.menu.as_ref())
            .await
            .context("Failed to seed demo data")?;
        info!(?summary, "Demo data ready");
    }

    let app = create_app(&config, repositories, metrics);

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Server listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
    shutdown_observability().await;
}
