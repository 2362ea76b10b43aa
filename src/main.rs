// =============================================================================
// MarketPulse Engine — Main Entry Point
// =============================================================================
//
// Wires together the contract catalog refresh loop, the seed watches, and
// the HTTP/WS edge server, then waits for Ctrl+C and shuts down gracefully.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod adapters;
mod analyzer;
mod api;
mod app_state;
mod broadcast;
mod catalog;
mod config;
mod error;
mod market_data;
mod registry;
mod signals;
mod types;
mod watcher;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::RuntimeConfig;
use crate::types::Venue;

const RUNTIME_CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & logging ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("MarketPulse engine starting up");

    let config = RuntimeConfig::load(RUNTIME_CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load runtime config, using defaults");
        RuntimeConfig::default()
    });

    info!(symbols = ?config.seed_symbols, bind_addr = %config.bind_addr, "runtime config loaded");

    // ── 2. Build shared state ──────────────────────────────────────────────
    let state = Arc::new(AppState::new(config));

    // ── 3. Contract discovery: initial fetch + periodic refresh loop ───────
    catalog::refresh(&state.catalog, &state.http).await;
    info!(count = state.catalog.len(), "initial catalog populated");

    let refresh_interval = state.config.read().catalog_refresh_secs;
    let refresh_catalog = state.catalog.clone();
    let refresh_client = state.http.clone();
    tokio::spawn(async move {
        // Initial fetch already happened above; this loop only re-fetches
        // every `refresh_interval` seconds thereafter (spec §4.6).
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(refresh_interval));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            catalog::refresh(&refresh_catalog, &refresh_client).await;
        }
    });

    // ── 4. Seed watches for configured symbols on every venue that lists ───
    //      them in the catalog (spec §4.5: Watch rejects unknown instruments,
    //      so venues that don't carry a seed symbol are silently skipped).
    let seed_symbols = state.config.read().seed_symbols.clone();
    let thresholds = state.config.read().alert_thresholds.clone();
    for symbol in &seed_symbols {
        for venue in [Venue::Bingx, Venue::Blofin, Venue::Hyperliquid] {
            match state.registry.watch(
                venue,
                symbol,
                &state.catalog,
                thresholds.clone(),
                state.hub.clone(),
                state.alert_log.clone(),
            ) {
                Ok(_) => info!(%venue, %symbol, "seed watch started"),
                Err(e) => warn!(%venue, %symbol, error = %e, "seed watch skipped"),
            }
        }
    }
    info!(count = state.registry.count(), "seed watchers running");

    // ── 5. HTTP/WS edge server ──────────────────────────────────────────────
    let bind_addr = std::env::var("SIGNAL_BIND_ADDR").unwrap_or_else(|_| state.config.read().bind_addr.clone());
    let api_state = state.clone();
    let server_addr = bind_addr.clone();
    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&server_addr)
            .await
            .expect("failed to bind edge server");
        info!(addr = %server_addr, "edge server listening");
        axum::serve(listener, app).await.expect("edge server failed");
    });

    info!("all subsystems running, press Ctrl+C to stop");

    // ── 6. Graceful shutdown ────────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received — stopping gracefully");

    if let Err(e) = state.config.read().save(RUNTIME_CONFIG_PATH) {
        warn!(error = %e, "failed to save runtime config on shutdown");
    }

    info!("MarketPulse engine shut down complete");
    Ok(())
}
