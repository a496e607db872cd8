mod align;
mod api;
mod cache;
mod config;
mod constants;
mod directions;
mod error;
mod extract;
mod field;
mod geo;
mod projection;
mod radolan;
mod spatial;
mod types;
mod units;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use reqwest::Client;
use tokio::fs;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{healthz, meta, point, ride};
use crate::cache::{HttpRadarSource, RadarFieldCache, SystemClock};
use crate::config::Config;
use crate::directions::DirectionsClient;
use crate::types::AppState;

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Arc::new(Config::from_env()?);
    fs::create_dir_all(&cfg.cache_dir)
        .await
        .with_context(|| format!("Failed to create {}", cfg.cache_dir.display()))?;

    let http = Client::builder()
        .timeout(cfg.request_timeout)
        .user_agent("velorain/0.1")
        .build()
        .context("Failed to build reqwest client")?;

    let radar = Arc::new(RadarFieldCache::new(
        Arc::new(HttpRadarSource::new(http.clone(), cfg.radar_url.clone())),
        Arc::new(SystemClock),
        cfg.refresh_window,
        cfg.cache_dir.clone(),
    ));
    let directions = Arc::new(DirectionsClient::new(
        http,
        cfg.geocoding_url.clone(),
        cfg.directions_url.clone(),
        cfg.mapbox_token.clone(),
    ));
    let state = AppState {
        cfg: cfg.clone(),
        radar,
        directions,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/meta", get(meta))
        .route("/v1/ride", get(ride))
        .route("/v1/point", get(point))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.listen_addr))?;

    info!("Rain forecast service listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .await
        .context("HTTP server failed")?;
    Ok(())
}
