// =============================================================================
// Runtime Configuration — screener settings with atomic save
// =============================================================================
//
// Central configuration for the screener: refresh cadence, worker pool size,
// tracked symbols, indicator windows, and quote-API parameters.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::indicators::IndicatorParams;
use crate::symbols::DEFAULT_SYMBOLS;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_worker_pool_size() -> usize {
    5
}

fn default_symbols() -> Vec<String> {
    DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()
}

fn default_quote_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_history_range() -> String {
    "1d".to_string()
}

fn default_history_interval() -> String {
    "1m".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the screener.
///
/// Every field has a serde default so that older JSON files missing new
/// fields will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Refresh cadence -----------------------------------------------------

    /// Seconds between automatic refresh cycles.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Maximum fetch+compute tasks in flight at once. Fixed at startup —
    /// the semaphore is sized once when the engine is built.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    // --- Symbols -------------------------------------------------------------

    /// Symbols the screener tracks when no watchlist file is configured.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Optional path to a JSON watchlist file; when set it replaces the
    /// config symbol list as the symbol source.
    #[serde(default)]
    pub watchlist_path: Option<String>,

    /// Whether a symbol that disappears from the tracked set has its
    /// snapshot entry evicted (true) or retained as stale (false).
    #[serde(default)]
    pub evict_dropped_symbols: bool,

    // --- Indicators ----------------------------------------------------------

    /// Indicator windows: RSI period and MACD fast/slow/signal spans.
    #[serde(default)]
    pub indicators: IndicatorParams,

    // --- Quote API -----------------------------------------------------------

    /// Base URL of the chart/price-history endpoint.
    #[serde(default = "default_quote_base_url")]
    pub quote_base_url: String,

    /// History window requested per fetch (e.g. "1d").
    #[serde(default = "default_history_range")]
    pub history_range: String,

    /// Bar resolution requested per fetch (e.g. "1m").
    #[serde(default = "default_history_interval")]
    pub history_interval: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            worker_pool_size: default_worker_pool_size(),
            symbols: default_symbols(),
            watchlist_path: None,
            evict_dropped_symbols: false,
            indicators: IndicatorParams::default(),
            quote_base_url: default_quote_base_url(),
            history_range: default_history_range(),
            history_interval: default_history_interval(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            interval_secs = config.refresh_interval_secs,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }
}
