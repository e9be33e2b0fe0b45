mod catalog;
mod config;
mod db;
mod errors;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::catalog::memory::InMemoryPromptStore;
use crate::catalog::postgres::PgPromptStore;
use crate::catalog::store::PromptStore;
use crate::config::{Config, StorageBackend};
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Prompt Catalog v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;

    let state = AppState { store };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs the catalog backend selected by `STORAGE_BACKEND`.
async fn build_store(config: &Config) -> Result<Arc<dyn PromptStore>> {
    match &config.storage {
        StorageBackend::Postgres { database_url } => {
            let pool =
                create_pool(database_url, config.max_connections, config.acquire_timeout).await?;
            Ok(Arc::new(PgPromptStore::new(pool)))
        }
        StorageBackend::Memory { seed_path } => {
            let store = match seed_path {
                Some(path) => InMemoryPromptStore::load(path)?,
                None => {
                    info!("No SEED_FILE set, starting with an empty in-memory catalog");
                    InMemoryPromptStore::from_seed(Default::default())?
                }
            };
            Ok(Arc::new(store))
        }
    }
}
