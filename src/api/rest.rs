// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// The presentation adapter over the snapshot store. All endpoints live under
// `/api/v1/`. Reads serve whatever the store holds right now; the refresh
// trigger is acknowledged immediately without waiting for the cycle.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::AppState;
use crate::snapshot::SymbolMetrics;
use crate::symbols::ensure_exchange_suffix;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/status", get(status))
        .route("/api/v1/stocks", get(list_stocks))
        .route("/api/v1/stocks/:symbol", get(get_stock))
        .route("/api/v1/refresh", post(trigger_refresh))
        .route("/api/v1/control/pause", post(control_pause))
        .route("/api/v1/control/resume", post(control_resume))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Response rows
// =============================================================================

/// One snapshot row as served to clients. Derived labels (RSI signal,
/// crossover) are rendered here so every consumer sees the same strings.
#[derive(Debug, Clone, Serialize)]
pub struct StockRow {
    pub symbol: String,
    pub price: f64,
    pub rsi: f64,
    pub rsi_signal: &'static str,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub macd_crossover: String,
    pub volume: i64,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
    pub cycle_seq: u64,
}

impl From<&SymbolMetrics> for StockRow {
    fn from(m: &SymbolMetrics) -> Self {
        Self {
            symbol: m.symbol.clone(),
            price: m.price,
            rsi: m.rsi,
            rsi_signal: m.rsi_signal(),
            macd: m.macd,
            macd_signal: m.macd_signal,
            macd_hist: m.macd_hist,
            macd_crossover: m.macd_crossover.to_string(),
            volume: m.volume,
            timestamp: m.timestamp,
            error: m.last_error.clone(),
            cycle_seq: m.cycle_seq,
        }
    }
}

// =============================================================================
// Sorting
// =============================================================================

/// Sortable columns of the stocks listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Symbol,
    Price,
    Rsi,
    Macd,
    Volume,
}

impl SortField {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("price") => Self::Price,
            Some("rsi") => Self::Rsi,
            Some("macd") => Self::Macd,
            Some("volume") => Self::Volume,
            _ => Self::Symbol,
        }
    }
}

/// Sort snapshot entries in place. Float comparisons treat incomparable
/// values (never produced by the indicator engine, but be safe) as equal.
pub fn sort_metrics(entries: &mut [SymbolMetrics], field: SortField, ascending: bool) {
    entries.sort_by(|a, b| {
        let ord = match field {
            SortField::Symbol => a.symbol.cmp(&b.symbol),
            SortField::Price => a
                .price
                .partial_cmp(&b.price)
                .unwrap_or(std::cmp::Ordering::Equal),
            SortField::Rsi => a
                .rsi
                .partial_cmp(&b.rsi)
                .unwrap_or(std::cmp::Ordering::Equal),
            SortField::Macd => a
                .macd
                .partial_cmp(&b.macd)
                .unwrap_or(std::cmp::Ordering::Equal),
            SortField::Volume => a.volume.cmp(&b.volume),
        };
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Status
// =============================================================================

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let last_cycle = state.last_cycle.read().clone();
    let body = serde_json::json!({
        "phase": state.phase.read().to_string(),
        "auto_refresh": state.auto_refresh_enabled(),
        "uptime_secs": state.uptime_secs(),
        "tracked_symbols": state.store.len(),
        "cycles_completed": state.cycles_completed.load(std::sync::atomic::Ordering::SeqCst),
        "stale_merges_total": state.stale_merges_total.load(std::sync::atomic::Ordering::SeqCst),
        "last_cycle": last_cycle,
        "state_version": state.current_state_version(),
    });
    Json(body)
}

// =============================================================================
// Stocks listing
// =============================================================================

#[derive(Debug, Deserialize)]
struct StocksQuery {
    sort_by: Option<String>,
    sort_order: Option<String>,
}

#[derive(Serialize)]
struct StocksResponse {
    stocks: Vec<StockRow>,
    timestamp: DateTime<Utc>,
}

async fn list_stocks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StocksQuery>,
) -> impl IntoResponse {
    let field = SortField::parse(query.sort_by.as_deref());
    let ascending = !matches!(query.sort_order.as_deref(), Some("desc"));

    let mut entries = state.store.get_all();
    sort_metrics(&mut entries, field, ascending);

    let resp = StocksResponse {
        stocks: entries.iter().map(StockRow::from).collect(),
        timestamp: Utc::now(),
    };
    Json(resp)
}

// =============================================================================
// Single stock
// =============================================================================

async fn get_stock(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    let symbol = ensure_exchange_suffix(&symbol);

    match state.store.get(&symbol) {
        Some(metrics) => Json(StockRow::from(&metrics)).into_response(),
        None => {
            let body = serde_json::json!({ "error": format!("Stock {symbol} not found") });
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        }
    }
}

// =============================================================================
// Refresh trigger & control
// =============================================================================

async fn trigger_refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let queued = state.request_refresh();
    info!(queued, "manual refresh requested");

    let body = serde_json::json!({
        "success": true,
        "message": if queued { "refresh cycle queued" } else { "refresh already pending" },
        "timestamp": Utc::now(),
    });
    (StatusCode::ACCEPTED, Json(body))
}

async fn control_pause(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.pause_auto_refresh();
    info!("auto-refresh paused");
    Json(serde_json::json!({ "auto_refresh": false }))
}

async fn control_resume(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.resume_auto_refresh();
    info!("auto-refresh resumed");
    Json(serde_json::json!({ "auto_refresh": true }))
}
