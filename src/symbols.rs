// =============================================================================
// Symbol Source — where the tracked watchlist comes from
// =============================================================================
//
// The screener never fetches symbols itself; it asks a `SymbolSource`. Two
// implementations ship here: one backed by the runtime config and one backed
// by a watchlist JSON file (the production deployment points this at an
// export from the positions database). The fallback-to-defaults rule lives
// in the refresh engine, not here — a source is allowed to return an empty
// list or fail.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tracing::info;

use crate::runtime_config::RuntimeConfig;

/// Watchlist used whenever the configured source fails or returns nothing.
pub const DEFAULT_SYMBOLS: [&str; 5] = [
    "RELIANCE.NS",
    "TCS.NS",
    "HDFCBANK.NS",
    "INFY.NS",
    "HINDUNILVR.NS",
];

/// NSE instruments carry a `.NS` suffix; bare tickers get one appended.
pub fn ensure_exchange_suffix(symbol: &str) -> String {
    let trimmed = symbol.trim().to_uppercase();
    if trimmed.ends_with(".NS") {
        trimmed
    } else {
        format!("{trimmed}.NS")
    }
}

/// Provider of the current tracked-symbol set.
pub trait SymbolSource: Send + Sync {
    fn list_symbols(&self) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// Config-backed source
// ---------------------------------------------------------------------------

/// Serves the `symbols` list straight out of the runtime config.
pub struct ConfigSymbolSource {
    config: Arc<RwLock<RuntimeConfig>>,
}

impl ConfigSymbolSource {
    pub fn new(config: Arc<RwLock<RuntimeConfig>>) -> Self {
        Self { config }
    }
}

impl SymbolSource for ConfigSymbolSource {
    fn list_symbols(&self) -> Result<Vec<String>> {
        Ok(self.config.read().symbols.clone())
    }
}

// ---------------------------------------------------------------------------
// Watchlist-file source
// ---------------------------------------------------------------------------

/// Reads a JSON array of symbols from disk on every listing, so an external
/// process can rewrite the watchlist between cycles without a restart.
pub struct WatchlistFileSource {
    path: PathBuf,
}

impl WatchlistFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!(path = %path.display(), "using watchlist file as symbol source");
        Self { path }
    }
}

impl SymbolSource for WatchlistFileSource {
    fn list_symbols(&self) -> Result<Vec<String>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read watchlist from {}", self.path.display()))?;

        let symbols: Vec<String> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse watchlist from {}", self.path.display()))?;

        Ok(symbols)
    }
}
