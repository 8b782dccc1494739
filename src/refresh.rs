// =============================================================================
// Refresh Engine — periodic fetch / compute / merge driver
// =============================================================================
//
// One cycle walks the tracked-symbol set and, per symbol, runs
// fetch → indicators → merge as an independent task. Tasks share a
// semaphore sized to the configured pool, so no more than that many fetches
// are in flight at once — across cycles, not just within one. Results come
// back over an mpsc channel and are merged on the consuming side.
//
// Cycles are allowed to overlap: the timer never waits for stragglers.
// Ordering correctness lives entirely in the snapshot store's cycle_seq
// check — a slow worker from an old cycle merges as a no-op.
//
// Per-symbol failures (fetch errors, short series) are recorded into that
// symbol's last_error and never abort the cycle or touch other symbols.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::indicators::{self, IndicatorParams};
use crate::market_data::MarketDataFetcher;
use crate::snapshot::{MergeOutcome, SymbolUpdate};
use crate::symbols::{ensure_exchange_suffix, SymbolSource, DEFAULT_SYMBOLS};

// ---------------------------------------------------------------------------
// Cycle bookkeeping
// ---------------------------------------------------------------------------

/// Where the engine currently is in its cycle. Status reporting only —
/// overlapping cycles make this a best-effort indicator, never a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CyclePhase {
    Idle,
    FetchingSymbolList,
    Dispatching,
    AwaitingWorkers,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::FetchingSymbolList => write!(f, "FetchingSymbolList"),
            Self::Dispatching => write!(f, "Dispatching"),
            Self::AwaitingWorkers => write!(f, "AwaitingWorkers"),
        }
    }
}

/// Outcome counts for one completed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub seq: u64,
    pub finished_at: DateTime<Utc>,
    pub symbols: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub stale_rejected: u64,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Periodic driver tying together symbol source, fetcher, indicator engine
/// and snapshot store.
pub struct RefreshEngine<F: MarketDataFetcher> {
    state: Arc<AppState>,
    fetcher: Arc<F>,
    source: Arc<dyn SymbolSource>,
    /// Bounds in-flight fetch tasks across *all* cycles.
    permits: Arc<Semaphore>,
    cycle_seq: AtomicU64,
}

impl<F: MarketDataFetcher> RefreshEngine<F> {
    pub fn new(state: Arc<AppState>, fetcher: Arc<F>, source: Arc<dyn SymbolSource>) -> Self {
        let pool_size = state.runtime_config.read().worker_pool_size.max(1);
        Self {
            state,
            fetcher,
            source,
            permits: Arc::new(Semaphore::new(pool_size)),
            cycle_seq: AtomicU64::new(0),
        }
    }

    /// Main loop: one immediate cycle, then periodic cycles gated by the
    /// auto-refresh flag, plus out-of-band cycles from the trigger channel.
    /// Each cycle runs in its own task so a slow one never delays the next.
    pub async fn run(self: Arc<Self>, mut trigger_rx: mpsc::Receiver<()>) {
        info!("refresh engine starting — initial cycle");
        Self::spawn_cycle(&self);

        loop {
            let period = std::time::Duration::from_secs(
                self.state.runtime_config.read().refresh_interval_secs.max(1),
            );

            tokio::select! {
                _ = tokio::time::sleep(period) => {
                    if self.state.auto_refresh_enabled() {
                        Self::spawn_cycle(&self);
                    }
                }
                triggered = trigger_rx.recv() => {
                    match triggered {
                        Some(()) => Self::spawn_cycle(&self),
                        // All senders gone — the app is shutting down.
                        None => break,
                    }
                }
            }
        }
    }

    /// Run one cycle in its own task so the caller never waits on it.
    fn spawn_cycle(engine: &Arc<Self>) {
        let engine = Arc::clone(engine);
        tokio::spawn(async move {
            engine.run_cycle().await;
        });
    }

    /// Execute one full refresh cycle:
    /// Idle → FetchingSymbolList → Dispatching → AwaitingWorkers → Idle.
    pub async fn run_cycle(&self) {
        let seq = self.cycle_seq.fetch_add(1, Ordering::SeqCst) + 1;

        // ── Symbol list ─────────────────────────────────────────────
        self.state.set_phase(CyclePhase::FetchingSymbolList);
        let symbols = self.tracked_symbols();

        if self.state.runtime_config.read().evict_dropped_symbols {
            let evicted = self.state.store.retain_tracked(&symbols);
            if evicted > 0 {
                info!(evicted, "evicted snapshot entries for dropped symbols");
            }
        }

        // ── Dispatch ────────────────────────────────────────────────
        self.state.set_phase(CyclePhase::Dispatching);
        let params = self.state.runtime_config.read().indicators.clone();
        let (tx, mut rx) = mpsc::channel::<(String, Result<SymbolUpdate, String>)>(symbols.len().max(1));

        for symbol in &symbols {
            let permits = self.permits.clone();
            let fetcher = self.fetcher.clone();
            let params = params.clone();
            let symbol = symbol.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let result = fetch_and_compute(fetcher.as_ref(), &symbol, &params).await;
                // Receiver gone means the cycle consumer died with the app;
                // nothing useful to do with the result then.
                let _ = tx.send((symbol, result)).await;
            });
        }
        drop(tx);

        // ── Collect & merge ─────────────────────────────────────────
        self.state.set_phase(CyclePhase::AwaitingWorkers);
        let mut succeeded = 0u64;
        let mut failed = 0u64;
        let mut stale_rejected = 0u64;

        while let Some((symbol, result)) = rx.recv().await {
            if let Err(ref message) = result {
                warn!(symbol = %symbol, cycle = seq, error = %message, "symbol refresh failed");
            }
            match self.state.store.merge(&symbol, result, seq) {
                MergeOutcome::Inserted | MergeOutcome::Updated => succeeded += 1,
                MergeOutcome::ErrorRecorded | MergeOutcome::SkippedUnknown => failed += 1,
                MergeOutcome::StaleRejected => stale_rejected += 1,
            }
        }

        // ── Wrap up ─────────────────────────────────────────────────
        self.state.set_phase(CyclePhase::Idle);
        self.state.record_cycle(CycleSummary {
            seq,
            finished_at: Utc::now(),
            symbols: symbols.len(),
            succeeded,
            failed,
            stale_rejected,
        });

        info!(
            cycle = seq,
            symbols = symbols.len(),
            succeeded,
            failed,
            stale_rejected,
            "refresh cycle complete"
        );
    }

    /// Current tracked set: listed from the source, suffix-normalised and
    /// de-duplicated. A failed or empty listing falls back to the default
    /// watchlist — the tracked set is never empty.
    fn tracked_symbols(&self) -> Vec<String> {
        let listed = match self.source.list_symbols() {
            Ok(symbols) => symbols,
            Err(e) => {
                warn!(error = %e, "symbol source failed — using default watchlist");
                Vec::new()
            }
        };

        let mut seen = Vec::new();
        for raw in &listed {
            let symbol = ensure_exchange_suffix(raw);
            if !seen.contains(&symbol) {
                seen.push(symbol);
            }
        }

        if seen.is_empty() {
            warn!("symbol source returned no symbols — using default watchlist");
            return DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect();
        }
        seen
    }
}

// ---------------------------------------------------------------------------
// Per-symbol task body
// ---------------------------------------------------------------------------

/// Fetch one symbol's history and compute its indicators. All errors are
/// flattened to strings at this task boundary; nothing propagates past it
/// into the cycle driver.
async fn fetch_and_compute<F: MarketDataFetcher>(
    fetcher: &F,
    symbol: &str,
    params: &IndicatorParams,
) -> Result<SymbolUpdate, String> {
    let series = fetcher.fetch(symbol).await.map_err(|e| e.to_string())?;

    let closes = series.closes();
    let snapshot = indicators::compute(&closes, params).map_err(|e| e.to_string())?;

    // Non-empty is guaranteed past compute(), but degrade rather than panic.
    let last = series
        .last()
        .ok_or_else(|| "no price data returned".to_string())?;

    let timestamp = DateTime::<Utc>::from_timestamp(last.timestamp, 0).unwrap_or_else(Utc::now);

    Ok(SymbolUpdate {
        price: last.close,
        volume: last.volume,
        timestamp,
        indicators: snapshot,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{FetchError, PricePoint, PriceSeries};
    use crate::runtime_config::RuntimeConfig;
    use std::collections::HashMap;

    // ---- test doubles ----------------------------------------------------

    /// Fetcher returning canned results per symbol.
    struct StubFetcher {
        results: HashMap<String, Result<PriceSeries, FetchError>>,
    }

    impl MarketDataFetcher for StubFetcher {
        async fn fetch(&self, symbol: &str) -> Result<PriceSeries, FetchError> {
            self.results
                .get(symbol)
                .cloned()
                .unwrap_or(Err(FetchError::EmptySeries))
        }
    }

    struct StubSource {
        symbols: Vec<String>,
        fail: bool,
    }

    impl SymbolSource for StubSource {
        fn list_symbols(&self) -> anyhow::Result<Vec<String>> {
            if self.fail {
                anyhow::bail!("database unreachable");
            }
            Ok(self.symbols.clone())
        }
    }

    fn rising_series(symbol: &str, n: usize) -> PriceSeries {
        PriceSeries {
            symbol: symbol.to_string(),
            points: (0..n)
                .map(|i| PricePoint {
                    timestamp: 1_700_000_000 + (i as i64) * 60,
                    close: 100.0 + i as f64 * 0.5,
                    volume: 1_000 + i as i64,
                })
                .collect(),
        }
    }

    fn engine_with(
        symbols: &[&str],
        results: HashMap<String, Result<PriceSeries, FetchError>>,
        source_fail: bool,
    ) -> (Arc<RefreshEngine<StubFetcher>>, Arc<AppState>) {
        let mut config = RuntimeConfig::default();
        config.symbols = symbols.iter().map(|s| s.to_string()).collect();

        let (tx, _rx) = mpsc::channel(1);
        let state = Arc::new(AppState::new(config, tx));
        let fetcher = Arc::new(StubFetcher { results });
        let source = Arc::new(StubSource {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            fail: source_fail,
        });
        let engine = Arc::new(RefreshEngine::new(state.clone(), fetcher, source));
        (engine, state)
    }

    // ---- cycles ----------------------------------------------------------

    #[tokio::test]
    async fn cycle_merges_every_symbol() {
        let mut results = HashMap::new();
        results.insert("TCS.NS".to_string(), Ok(rising_series("TCS.NS", 40)));
        results.insert("INFY.NS".to_string(), Ok(rising_series("INFY.NS", 40)));

        let (engine, state) = engine_with(&["TCS.NS", "INFY.NS"], results, false);
        engine.run_cycle().await;

        assert_eq!(state.store.len(), 2);
        let tcs = state.store.get("TCS.NS").unwrap();
        assert_eq!(tcs.cycle_seq, 1);
        assert!(tcs.last_error.is_none());
        assert!(tcs.price > 100.0);

        let summary = state.last_cycle.read().clone().unwrap();
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn per_symbol_failure_is_isolated() {
        let mut results = HashMap::new();
        results.insert("TCS.NS".to_string(), Ok(rising_series("TCS.NS", 40)));
        results.insert(
            "INFY.NS".to_string(),
            Err(FetchError::NetworkFailure("connection reset".into())),
        );

        let (engine, state) = engine_with(&["TCS.NS", "INFY.NS"], results, false);
        engine.run_cycle().await;

        // The failing symbol never succeeded, so it has no entry; the
        // healthy one merged normally.
        assert!(state.store.get("INFY.NS").is_none());
        assert!(state.store.get("TCS.NS").is_some());

        let summary = state.last_cycle.read().clone().unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn failure_after_success_keeps_last_good_metrics() {
        let mut results = HashMap::new();
        results.insert("TCS.NS".to_string(), Ok(rising_series("TCS.NS", 40)));
        let (engine, state) = engine_with(&["TCS.NS"], results, false);
        engine.run_cycle().await;
        let good = state.store.get("TCS.NS").unwrap();

        // Second cycle: same fetcher now times out. Swap via a new engine
        // sharing the same state (the store is what carries over).
        let mut failing = HashMap::new();
        failing.insert("TCS.NS".to_string(), Err(FetchError::Timeout));
        let fetcher = Arc::new(StubFetcher { results: failing });
        let source = Arc::new(StubSource {
            symbols: vec!["TCS.NS".into()],
            fail: false,
        });
        let engine2 = Arc::new(RefreshEngine::new(state.clone(), fetcher, source));
        engine2.cycle_seq.store(1, Ordering::SeqCst);
        engine2.run_cycle().await;

        let after = state.store.get("TCS.NS").unwrap();
        assert_eq!(after.price, good.price);
        assert_eq!(after.last_error.as_deref(), Some("request timed out"));
        assert_eq!(after.cycle_seq, 2);
    }

    #[tokio::test]
    async fn short_series_records_insufficient_data() {
        let mut results = HashMap::new();
        results.insert("TCS.NS".to_string(), Ok(rising_series("TCS.NS", 40)));
        let (engine, state) = engine_with(&["TCS.NS"], results, false);
        engine.run_cycle().await;

        let mut short = HashMap::new();
        short.insert("TCS.NS".to_string(), Ok(rising_series("TCS.NS", 10)));
        let fetcher = Arc::new(StubFetcher { results: short });
        let source = Arc::new(StubSource {
            symbols: vec!["TCS.NS".into()],
            fail: false,
        });
        let engine2 = Arc::new(RefreshEngine::new(state.clone(), fetcher, source));
        engine2.cycle_seq.store(1, Ordering::SeqCst);
        engine2.run_cycle().await;

        let entry = state.store.get("TCS.NS").unwrap();
        assert!(entry
            .last_error
            .as_deref()
            .unwrap()
            .contains("insufficient data"));
    }

    #[tokio::test]
    async fn consecutive_cycles_raise_cycle_seq() {
        let mut results = HashMap::new();
        results.insert("TCS.NS".to_string(), Ok(rising_series("TCS.NS", 40)));
        let (engine, state) = engine_with(&["TCS.NS"], results, false);

        engine.run_cycle().await;
        engine.run_cycle().await;

        let entry = state.store.get("TCS.NS").unwrap();
        assert_eq!(entry.cycle_seq, 2);
        // Second cycle's prev pair is first cycle's values.
        assert!(entry.prev_macd.is_some());
        assert_eq!(state.cycles_completed.load(Ordering::SeqCst), 2);
    }

    // ---- symbol listing --------------------------------------------------

    #[tokio::test]
    async fn failed_source_falls_back_to_defaults() {
        let (engine, _state) = engine_with(&[], HashMap::new(), true);
        let symbols = engine.tracked_symbols();
        assert_eq!(symbols.len(), DEFAULT_SYMBOLS.len());
        assert_eq!(symbols[0], "RELIANCE.NS");
    }

    #[tokio::test]
    async fn empty_source_falls_back_to_defaults() {
        let (engine, _state) = engine_with(&[], HashMap::new(), false);
        let symbols = engine.tracked_symbols();
        assert_eq!(symbols.len(), DEFAULT_SYMBOLS.len());
    }

    #[tokio::test]
    async fn listing_normalises_and_dedupes() {
        let (engine, _state) = engine_with(&["tcs", "TCS.NS", " infy "], HashMap::new(), false);
        let symbols = engine.tracked_symbols();
        assert_eq!(symbols, vec!["TCS.NS".to_string(), "INFY.NS".to_string()]);
    }

    #[tokio::test]
    async fn eviction_prunes_dropped_symbols_when_enabled() {
        let mut results = HashMap::new();
        results.insert("TCS.NS".to_string(), Ok(rising_series("TCS.NS", 40)));
        results.insert("INFY.NS".to_string(), Ok(rising_series("INFY.NS", 40)));
        let (engine, state) = engine_with(&["TCS.NS", "INFY.NS"], results, false);
        engine.run_cycle().await;
        assert_eq!(state.store.len(), 2);

        state.runtime_config.write().evict_dropped_symbols = true;
        let mut results = HashMap::new();
        results.insert("TCS.NS".to_string(), Ok(rising_series("TCS.NS", 40)));
        let fetcher = Arc::new(StubFetcher { results });
        let source = Arc::new(StubSource {
            symbols: vec!["TCS.NS".into()],
            fail: false,
        });
        let engine2 = Arc::new(RefreshEngine::new(state.clone(), fetcher, source));
        engine2.cycle_seq.store(1, Ordering::SeqCst);
        engine2.run_cycle().await;

        assert!(state.store.get("INFY.NS").is_none());
        assert_eq!(state.store.len(), 1);
    }

    // ---- fetch_and_compute -----------------------------------------------

    #[tokio::test]
    async fn task_output_carries_latest_bar() {
        let fetcher = StubFetcher {
            results: HashMap::from([(
                "TCS.NS".to_string(),
                Ok(rising_series("TCS.NS", 30)),
            )]),
        };
        let update = fetch_and_compute(&fetcher, "TCS.NS", &IndicatorParams::default())
            .await
            .unwrap();
        // Last of 30 rising closes: 100 + 29*0.5.
        assert_eq!(update.price, 114.5);
        assert_eq!(update.volume, 1_029);
        assert_eq!(
            update.indicators.macd_hist,
            update.indicators.macd - update.indicators.macd_signal
        );
    }

    #[tokio::test]
    async fn task_flattens_fetch_errors() {
        let fetcher = StubFetcher {
            results: HashMap::new(),
        };
        let err = fetch_and_compute(&fetcher, "MISSING.NS", &IndicatorParams::default())
            .await
            .unwrap_err();
        assert_eq!(err, "no price data returned");
    }
}
