mod config;
mod content;
mod db;
mod errors;
mod masonry;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::content::sections::default_sections;
use crate::content::store::PgContentStore;
use crate::db::create_pool;
use crate::masonry::{CachedProbe, HttpDimensionProbe};
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

    info!("Starting Folio API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the table store
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgContentStore::new(db));

    // Initialize image probing (cached for the lifetime of the process)
    let probe = Arc::new(CachedProbe::new(HttpDimensionProbe::new(
        config.image_probe_timeout,
    )?));
    info!(
        "Masonry config: min column {}px, gap {}px",
        config.masonry.min_column_width, config.masonry.gap
    );

    // Build app state
    let state = AppState {
        store,
        probe,
        masonry: config.masonry.clone(),
        sections: Arc::new(default_sections()),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the site origin once it has a fixed domain

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
