//! vt-premium HTTP Server
//!
//! Axum-based server for premium checkout, payment confirmation webhooks
//! and the market data page.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vt_market::{HttpMarketSource, MarketSource, StaticMarketSource};
use vt_payments::{MemoryStore, PaymentsConfig, ReqwestTransport};

use crate::handlers::{
    create_checkout, epayco_webhook_get, epayco_webhook_post, health_check, market_snapshot,
    stripe_webhook,
};
use crate::state::AppState;

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        // Checkout
        .route("/api/checkout", post(create_checkout))
        // Provider confirmations
        .route(
            "/api/webhooks/epayco",
            post(epayco_webhook_post).get(epayco_webhook_get),
        )
        .route("/api/webhooks/stripe", post(stripe_webhook))
        // Market page
        .route("/api/market", get(market_snapshot))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = PaymentsConfig::from_env()?;
    tracing::info!(base_url = %config.base_url, "Public base URL");

    if !config.base_url.starts_with("https://") {
        tracing::warn!("⚠ Base URL is not HTTPS - providers will not receive webhook URLs");
    }

    let market: Arc<dyn MarketSource> = match HttpMarketSource::from_env() {
        Some(source) => {
            tracing::info!(url = %source.url(), "✓ Market API configured");
            Arc::new(source)
        }
        None => {
            tracing::warn!("⚠ MARKET_API_URL not set - serving sample market data");
            Arc::new(StaticMarketSource::sample())
        }
    };

    // Orders, transactions and entitlements share one store
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        &config,
        Arc::new(ReqwestTransport::new()),
        store.clone(),
        store,
        market,
    );

    let gateways = state.dispatcher.configured_methods();
    if gateways.is_empty() {
        tracing::warn!("⚠ No payment gateway configured - checkout disabled");
    }
    for method in &gateways {
        tracing::info!("✓ {} configured", method.display_name());
    }
    if !state.stripe.is_enabled() {
        tracing::warn!("⚠ STRIPE_WEBHOOK_SECRET not set - Stripe webhook answers 503");
    }

    let app = router(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 vt-premium server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                - Health check");
    tracing::info!("  POST /api/checkout          - Start premium checkout");
    tracing::info!("  POST /api/webhooks/epayco   - ePayco confirmation");
    tracing::info!("  GET  /api/webhooks/epayco   - ePayco notification (ack only)");
    tracing::info!("  POST /api/webhooks/stripe   - Stripe events");
    tracing::info!("  GET  /api/market            - Market snapshot");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
