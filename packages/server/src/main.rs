use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::HeaderValue;
use common::StorageBackend;
use common::storage::build_asset_store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use cms_server::config::{AppConfig, CorsConfig};
use cms_server::database::init_db;
use cms_server::seed;
use cms_server::state::AppState;

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(config.max_age));

    if config.allow_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allow_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cms_server=info,common=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = init_db(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    seed::ensure_indexes(&db).await?;
    seed::ensure_singletons(&db).await?;

    let assets = build_asset_store(&config.storage)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialise asset store: {e}"))?;
    info!(backend = ?config.storage.backend, "Asset store ready");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let cors = cors_layer(&config.server.cors);
    let storage = config.storage.clone();

    let state = AppState {
        db,
        config: Arc::new(config),
        assets,
    };

    let mut app = cms_server::build_router(state);
    if storage.backend == StorageBackend::Filesystem && storage.public_base_url.starts_with('/') {
        app = app.nest_service(&storage.public_base_url, ServeDir::new(&storage.root));
    }
    let app = app.layer(cors);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running at http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
