pub mod api;
pub mod config;
pub mod container;
pub mod db;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod report;

use std::sync::Arc;
use tokio::sync::Mutex;

use api::AppState;
use config::ServerConfig;
use db::Database;
use fetch::Fetcher;

/// Assemble shared state. The database is opened only when `DATABASE_URL` is set.
pub fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let db = match config.database_url {
        Some(ref path) => {
            let db = Database::new(path)?;
            tracing::info!("Using database {} ({})", db.name(), path);
            Some(Arc::new(Mutex::new(db)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; evaluation endpoints are disabled");
            None
        }
    };

    Ok(AppState {
        db,
        fetcher: Fetcher::new(config.fetch.clone())?,
        database_url_set: config.database_url.is_some(),
        database_name_set: config.database_name.is_some(),
    })
}

pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let state = build_state(&config)?;
    let app = api::router(state);

    let addr = config.bind_addr();
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
