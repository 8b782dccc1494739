// =============================================================================
// Snapshot Store — latest merged metrics per tracked symbol
// =============================================================================
//
// The single owner of mutable screener state. Entries are kept in insertion
// order; every read hands out clones so callers never hold the lock.
//
// Merge contract:
//   - success: shift macd/macd_signal into prev_macd/prev_signal, overwrite
//     the numeric fields, reclassify the crossover, clear last_error
//   - failure: record last_error only, numeric fields untouched
//   - either way the merge is dropped unless its cycle_seq is strictly
//     greater than the stored one, so a straggler from an old cycle can
//     never overwrite fresher data
//
// prev_macd/prev_signal move only on successful merges: crossovers always
// compare against the last cycle that actually produced numbers.
//
// Thread-safety: one coarse `parking_lot::RwLock` over the entry list.
// Symbol counts are tens, not thousands; a linear scan under the lock is
// cheaper than anything clever.
// =============================================================================

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use crate::crossover::{self, Crossover};
use crate::indicators::IndicatorSnapshot;

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

/// Latest merged metrics for one symbol.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolMetrics {
    pub symbol: String,
    pub price: f64,
    pub volume: i64,
    pub timestamp: DateTime<Utc>,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    /// Always `macd - macd_signal`; never written independently.
    pub macd_hist: f64,
    pub macd_crossover: Crossover,
    /// MACD/signal from the previous *successful* cycle. `None` until a
    /// symbol has completed two successful cycles.
    pub prev_macd: Option<f64>,
    pub prev_signal: Option<f64>,
    /// Error from the most recent failed cycle; cleared on the next
    /// success. Coexists with the (stale but valid) numeric fields.
    pub last_error: Option<String>,
    /// Sequence of the cycle that last wrote this entry.
    pub cycle_seq: u64,
}

impl SymbolMetrics {
    /// Overbought / Oversold / Neutral label for the stored RSI.
    pub fn rsi_signal(&self) -> &'static str {
        crate::indicators::rsi::rsi_label(self.rsi)
    }
}

/// Payload produced by a successful fetch+compute task.
#[derive(Debug, Clone)]
pub struct SymbolUpdate {
    pub price: f64,
    pub volume: i64,
    pub timestamp: DateTime<Utc>,
    pub indicators: IndicatorSnapshot,
}

/// What `merge` did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First successful cycle for this symbol — entry created.
    Inserted,
    /// Existing entry overwritten with fresh metrics.
    Updated,
    /// Failure recorded on an existing entry; numbers untouched.
    ErrorRecorded,
    /// Dropped: cycle_seq was not strictly greater than the stored one.
    StaleRejected,
    /// Failure for a symbol that has never succeeded — nothing to record.
    SkippedUnknown,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Insertion-ordered, concurrency-safe symbol → metrics map.
pub struct SnapshotStore {
    entries: RwLock<Vec<SymbolMetrics>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Latest metrics for one symbol, if it has ever succeeded.
    pub fn get(&self, symbol: &str) -> Option<SymbolMetrics> {
        self.entries
            .read()
            .iter()
            .find(|e| e.symbol == symbol)
            .cloned()
    }

    /// Snapshot-consistent copy of every entry, in insertion order.
    pub fn get_all(&self) -> Vec<SymbolMetrics> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Apply one per-symbol cycle result. See the module header for the
    /// full contract.
    pub fn merge(
        &self,
        symbol: &str,
        result: Result<SymbolUpdate, String>,
        cycle_seq: u64,
    ) -> MergeOutcome {
        let mut entries = self.entries.write();

        match entries.iter_mut().find(|e| e.symbol == symbol) {
            Some(entry) => {
                if cycle_seq <= entry.cycle_seq {
                    debug!(
                        symbol,
                        attempted = cycle_seq,
                        stored = entry.cycle_seq,
                        "stale merge rejected"
                    );
                    return MergeOutcome::StaleRejected;
                }

                match result {
                    Ok(update) => {
                        // Shift the previous successful pair before the
                        // overwrite so the crossover compares new vs old.
                        entry.prev_macd = Some(entry.macd);
                        entry.prev_signal = Some(entry.macd_signal);

                        let ind = update.indicators;
                        entry.price = update.price;
                        entry.volume = update.volume;
                        entry.timestamp = update.timestamp;
                        entry.rsi = ind.rsi;
                        entry.macd = ind.macd;
                        entry.macd_signal = ind.macd_signal;
                        entry.macd_hist = ind.macd_hist;
                        entry.macd_crossover = crossover::classify(
                            entry.prev_macd,
                            entry.prev_signal,
                            ind.macd,
                            ind.macd_signal,
                        );
                        entry.last_error = None;
                        entry.cycle_seq = cycle_seq;
                        MergeOutcome::Updated
                    }
                    Err(message) => {
                        entry.last_error = Some(message);
                        entry.cycle_seq = cycle_seq;
                        MergeOutcome::ErrorRecorded
                    }
                }
            }
            None => match result {
                Ok(update) => {
                    let ind = update.indicators;
                    entries.push(SymbolMetrics {
                        symbol: symbol.to_string(),
                        price: update.price,
                        volume: update.volume,
                        timestamp: update.timestamp,
                        rsi: ind.rsi,
                        macd: ind.macd,
                        macd_signal: ind.macd_signal,
                        macd_hist: ind.macd_hist,
                        macd_crossover: Crossover::None,
                        prev_macd: None,
                        prev_signal: None,
                        last_error: None,
                        cycle_seq,
                    });
                    MergeOutcome::Inserted
                }
                Err(message) => {
                    // Entries are born on first success; a symbol that has
                    // never produced metrics has nothing worth showing.
                    warn!(symbol, error = %message, "fetch failed before first success");
                    MergeOutcome::SkippedUnknown
                }
            },
        }
    }

    /// Drop entries whose symbol is not in `tracked`. Returns how many were
    /// evicted. Only called when eviction is enabled in config.
    pub fn retain_tracked(&self, tracked: &[String]) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| tracked.iter().any(|s| s == &e.symbol));
        before - entries.len()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
