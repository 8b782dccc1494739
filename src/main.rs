// =============================================================================
// Pulse Market Screener — Main Entry Point
// =============================================================================
//
// Wires the pieces together: config, shared state, the refresh engine and
// the REST API, then waits for ctrl-c and saves config on the way out.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod crossover;
mod indicators;
mod market_data;
mod refresh;
mod runtime_config;
mod snapshot;
mod symbols;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::QuoteClient;
use crate::refresh::RefreshEngine;
use crate::runtime_config::RuntimeConfig;
use crate::symbols::{ensure_exchange_suffix, ConfigSymbolSource, SymbolSource, WatchlistFileSource};

/// Config file sitting next to the binary; saved back on shutdown.
const CONFIG_PATH: &str = "screener_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Pulse Market Screener — starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Override symbols from env if available.
    if let Ok(syms) = std::env::var("PULSE_SYMBOLS") {
        config.symbols = syms
            .split(',')
            .map(ensure_exchange_suffix)
            .filter(|s| s != ".NS")
            .collect();
    }
    if config.symbols.is_empty() {
        config.symbols = symbols::DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect();
    }

    info!(
        symbols = ?config.symbols,
        interval_secs = config.refresh_interval_secs,
        workers = config.worker_pool_size,
        "Configured watchlist"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let quote_base_url = config.quote_base_url.clone();
    let history_range = config.history_range.clone();
    let history_interval = config.history_interval.clone();
    let watchlist_path = config.watchlist_path.clone();

    // Capacity 1: pending manual triggers coalesce into one cycle.
    let (refresh_tx, refresh_rx) = mpsc::channel(1);
    let state = Arc::new(AppState::new(config, refresh_tx));

    // ── 3. Fetcher & symbol source ───────────────────────────────────────
    let fetcher = Arc::new(QuoteClient::new(quote_base_url, history_range, history_interval));

    let source: Arc<dyn SymbolSource> = match watchlist_path {
        Some(path) => Arc::new(WatchlistFileSource::new(path)),
        None => Arc::new(ConfigSymbolSource::new(state.runtime_config.clone())),
    };

    // ── 4. Refresh engine ────────────────────────────────────────────────
    let engine = Arc::new(RefreshEngine::new(state.clone(), fetcher, source));
    tokio::spawn(engine.run(refresh_rx));

    // ── 5. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = std::env::var("PULSE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let bind_addr_clone = bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr_clone)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr_clone, "API server listening");
        axum::serve(listener, app)
            .await
            .expect("API server failed");
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if let Err(e) = state.runtime_config.read().save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Pulse Market Screener shut down complete.");
    Ok(())
}
