// =============================================================================
// Divergence Scanner — Main Entry Point
// =============================================================================
//
// Seeds one candle window per configured symbol from Bybit, keeps it current
// from the public kline websocket and serves divergence snapshots over HTTP.
// =============================================================================

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use divergence_scanner::api;
use divergence_scanner::app_state::AppState;
use divergence_scanner::bybit::BybitClient;
use divergence_scanner::config::ScannerConfig;

const CONFIG_PATH: &str = "scanner_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Divergence Scanner starting up");

    let mut config = ScannerConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        ScannerConfig::default()
    });
    config.apply_env()?;

    info!(
        symbols = ?config.symbols,
        interval = %config.interval,
        category = %config.category,
        "Configured scanner"
    );

    // ── 2. Bybit client & shared state ───────────────────────────────────
    let client = Arc::new(BybitClient::new(&config.rest_base, &config.category, config.interval)?);
    let rate_limits = Arc::clone(client.rate_limits());

    let state = Arc::new(
        AppState::new(client, config.worker_settings(), config.presets.clone())
            .with_rate_limits(rate_limits),
    );

    // ── 3. Symbol workers ────────────────────────────────────────────────
    for symbol in &config.symbols {
        state.watch(symbol);
    }
    info!(count = config.symbols.len(), "Symbol workers launched");

    // ── 4. API server ────────────────────────────────────────────────────
    let app = api::rest::router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            warn!("Shutdown signal received, stopping gracefully");
        })
        .await
        .context("API server failed")?;

    // ── 5. Stop workers ──────────────────────────────────────────────────
    for summary in state.symbols() {
        state.unwatch(&summary.symbol);
    }

    info!("Divergence Scanner shut down complete.");
    Ok(())
}
