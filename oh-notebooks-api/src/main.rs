//! # Open Humans Notebooks API Server
//!
//! Lets Open Humans members share Jupyter notebooks and discover notebooks
//! shared by others.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p oh-notebooks-api
//! ```

use oh_notebooks_api::{
    app::{build_router, AppState},
    config::Config,
};
use oh_notebooks_shared::{
    clock::SystemClock,
    db::{
        migrations::{ensure_database_exists, get_migration_status, run_migrations},
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    openhumans::client::OpenHumansClient,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "oh_notebooks_api=debug,oh_notebooks_shared=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Open Humans Notebooks API v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    ensure_database_exists(&config.database.url).await?;
    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;
    run_migrations(&pool).await?;

    let status = get_migration_status(&pool).await?;
    tracing::info!(
        applied = status.applied_migrations,
        latest = ?status.latest_version,
        "Database schema ready"
    );

    let api = Arc::new(OpenHumansClient::new(&config.openhumans.oh_base_url)?);
    let bind_address = config.bind_address();
    let state = AppState::new(pool.clone(), config, api, Arc::new(SystemClock));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received, exiting...");
        })
        .await?;

    close_pool(pool).await;
    Ok(())
}
