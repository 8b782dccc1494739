// =============================================================================
// Central Application State — Pulse Market Screener
// =============================================================================
//
// The single source of truth shared by the refresh engine and the REST API.
//
// Thread safety:
//   - Atomic counters for lock-free version / telemetry tracking.
//   - parking_lot::RwLock for mutable shared values.
//   - The snapshot store manages its own interior mutability.
// =============================================================================

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::debug;

use crate::refresh::{CyclePhase, CycleSummary};
use crate::runtime_config::RuntimeConfig;
use crate::snapshot::SnapshotStore;

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, incremented on every
    /// meaningful state mutation. Lets pollers cheaply detect change.
    pub state_version: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    // ── Snapshot store ──────────────────────────────────────────────────
    pub store: Arc<SnapshotStore>,

    // ── Refresh control ─────────────────────────────────────────────────
    /// Gate for the periodic timer; manual triggers ignore it.
    pub auto_refresh: AtomicBool,
    /// Channel into the refresh engine's trigger loop.
    refresh_tx: mpsc::Sender<()>,

    // ── Cycle telemetry ─────────────────────────────────────────────────
    pub phase: RwLock<CyclePhase>,
    pub last_cycle: RwLock<Option<CycleSummary>>,
    pub cycles_completed: AtomicU64,
    pub stale_merges_total: AtomicU64,

    // ── Timing ──────────────────────────────────────────────────────────
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct a new `AppState` from the given runtime configuration and
    /// the sender half of the refresh trigger channel. The returned value
    /// is typically wrapped in `Arc` immediately.
    pub fn new(config: RuntimeConfig, refresh_tx: mpsc::Sender<()>) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            runtime_config: Arc::new(RwLock::new(config)),
            store: Arc::new(SnapshotStore::new()),
            auto_refresh: AtomicBool::new(true),
            refresh_tx,
            phase: RwLock::new(CyclePhase::Idle),
            last_cycle: RwLock::new(None),
            cycles_completed: AtomicU64::new(0),
            stale_merges_total: AtomicU64::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Refresh control ─────────────────────────────────────────────────

    /// Ask the engine for an out-of-band cycle. Returns false when a
    /// trigger is already queued (which is just as good — a cycle is
    /// coming either way).
    pub fn request_refresh(&self) -> bool {
        self.refresh_tx.try_send(()).is_ok()
    }

    pub fn pause_auto_refresh(&self) {
        self.auto_refresh.store(false, Ordering::SeqCst);
        self.increment_version();
    }

    pub fn resume_auto_refresh(&self) {
        self.auto_refresh.store(true, Ordering::SeqCst);
        self.increment_version();
    }

    pub fn auto_refresh_enabled(&self) -> bool {
        self.auto_refresh.load(Ordering::SeqCst)
    }

    // ── Cycle telemetry ─────────────────────────────────────────────────

    pub fn set_phase(&self, phase: CyclePhase) {
        *self.phase.write() = phase;
    }

    pub fn record_cycle(&self, summary: CycleSummary) {
        debug!(cycle = summary.seq, ok = summary.succeeded, failed = summary.failed, "cycle recorded");
        self.stale_merges_total
            .fetch_add(summary.stale_rejected, Ordering::SeqCst);
        self.cycles_completed.fetch_add(1, Ordering::SeqCst);
        *self.last_cycle.write() = Some(summary);
        self.increment_version();
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
