mod api;
mod config;
mod db;
mod error;
mod tag;
mod web;

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Shared application state
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(tag::router())
        .merge(web::router())
        .nest("/api", api::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "petfeeder_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Connect to database
    let db = db::connect(&config.database_url).await?;

    // Run migrations
    db::migrate(&db).await?;

    if config.feed_interval_secs > 0 {
        tracing::info!("Feeding limited to once every {}s per pet", config.feed_interval_secs);
    }

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
    });

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("Pet feeder server listening on {}", config.bind_address);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
