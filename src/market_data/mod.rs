pub mod quote_client;

// Re-export the fetcher contract types (e.g. `use crate::market_data::PriceSeries`).
pub use quote_client::QuoteClient;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// One observed bar: timestamp (epoch seconds), close price, traded volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: i64,
    pub close: f64,
    pub volume: i64,
}

/// An ordered price history for one symbol, oldest first, most recent last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    /// Most recent bar, if any.
    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Per-symbol fetch failure. The refresh engine treats every variant the
/// same way (record and move on); the split exists for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The upstream returned a well-formed but empty history.
    EmptySeries,
    /// Transport or decoding failure, with the upstream message.
    NetworkFailure(String),
    /// The request exceeded the client deadline.
    Timeout,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySeries => write!(f, "no price data returned"),
            Self::NetworkFailure(msg) => write!(f, "network failure: {msg}"),
            Self::Timeout => write!(f, "request timed out"),
        }
    }
}

impl std::error::Error for FetchError {}

// ---------------------------------------------------------------------------
// Fetcher contract
// ---------------------------------------------------------------------------

/// Contract between the refresh engine and whatever supplies price history.
///
/// Implementations own their transport concerns (timeouts, retries if any);
/// the engine never retries and treats every error as a per-symbol failure.
pub trait MarketDataFetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        symbol: &str,
    ) -> impl std::future::Future<Output = Result<PriceSeries, FetchError>> + Send;
}
