//! debi checkout demo server
//!
//! Axum server proxying a handful of routes to the debi payments API.

mod config;
mod handlers;
mod routes;
mod state;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ServerConfig, prompt_customer_id};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ServerConfig::from_env();
    if config.default_customer_id.is_none() {
        config.default_customer_id = prompt_customer_id();
    }

    let state = AppState::from_config(&config)?;

    if state.debi.is_some() {
        tracing::info!(
            endpoint = config.debi.endpoint(),
            sandbox = config.debi.sandbox,
            "✓ debi API configured"
        );
    } else {
        tracing::warn!("⚠ DEBI_API_KEY not set - payment routes will answer 400");
        tracing::warn!("  Get a token at https://debi-test.pro/dashboard/developers");
    }
    if state.webhook.is_none() {
        tracing::warn!("⚠ DEBI_API_WEBHOOK_SECRET not set - webhooks will be rejected");
    }
    match &state.default_customer_id {
        Some(customer_id) => tracing::info!(%customer_id, "Default customer"),
        None => tracing::info!("No default customer - pass ?customer_id=..."),
    }

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("🚀 debi demo server running on http://{}", config.bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /                   - Setup instructions");
    tracing::info!("  GET  /health             - Health check");
    tracing::info!("  GET  /debi/payment       - Create payment");
    tracing::info!("  GET  /debi/subscription  - Create subscription");
    tracing::info!("  GET  /debi/callback      - Checkout success redirect");
    tracing::info!("  POST /debi/webhooks      - Webhook receiver");

    axum::serve(listener, app).await?;

    Ok(())
}
