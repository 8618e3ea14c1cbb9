//! checkout-server
//!
//! Axum server receiving LemonSqueezy and Paddle webhooks and serving the
//! product catalogs. Verified events are published on a broadcast channel for
//! downstream consumers.

mod config;
mod handlers;
mod routes;
mod state;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::routes::router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment before reading RUST_LOG
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let state = AppState::from_config(&config)?;

    for (name, configured) in [
        ("LemonSqueezy", state.lemonsqueezy.is_some()),
        ("Paddle", state.paddle.is_some()),
    ] {
        if configured {
            tracing::info!("✓ {name} webhooks configured");
        } else {
            tracing::warn!("⚠ {name} webhook secret not set - endpoint disabled");
        }
    }

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("checkout-server running on http://{}", config.bind_addr);
    tracing::info!("  GET  /health                - Health check");
    tracing::info!("  GET  /api/products          - Product catalogs");
    tracing::info!("  POST /webhook/lemonsqueezy  - LemonSqueezy notifications");
    tracing::info!("  POST /webhook/paddle        - Paddle notifications");

    axum::serve(listener, app).await?;

    Ok(())
}
