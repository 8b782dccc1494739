// =============================================================================
// Quote Client — intraday price history over HTTP
// =============================================================================
//
// Thin wrapper around the Yahoo-style chart endpoint:
//
//   GET {base}/v8/finance/chart/{symbol}?range=1d&interval=1m
//
// The response nests parallel arrays: `timestamp[]` plus
// `indicators.quote[0].close[]` / `.volume[]`. Minutes with no trades are
// null-padded, so the three arrays are walked together and incomplete bars
// are skipped rather than zero-filled.
// =============================================================================

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::market_data::{FetchError, MarketDataFetcher, PricePoint, PriceSeries};

/// Request deadline; hitting it surfaces as [`FetchError::Timeout`].
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// HTTP client for the chart/price-history API.
#[derive(Clone)]
pub struct QuoteClient {
    client: reqwest::Client,
    base_url: String,
    range: String,
    interval: String,
}

impl QuoteClient {
    /// Create a client fetching `range` of history at `interval` resolution
    /// (e.g. "1d" / "1m").
    pub fn new(base_url: impl Into<String>, range: impl Into<String>, interval: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("pulse-screener/1.0")
            .build()
            .expect("failed to build reqwest client");

        Self {
            client,
            base_url: base_url.into(),
            range: range.into(),
            interval: interval.into(),
        }
    }

    async fn fetch_history(&self, symbol: &str) -> Result<PriceSeries, FetchError> {
        let url = format!(
            "{}/v8/finance/chart/{}?range={}&interval={}&includePrePost=false",
            self.base_url, symbol, self.range, self.interval
        );

        let resp = self.client.get(&url).send().await.map_err(map_reqwest_err)?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await.map_err(map_reqwest_err)?;

        if !status.is_success() {
            return Err(FetchError::NetworkFailure(format!(
                "chart endpoint returned {status}: {body}"
            )));
        }

        let series = Self::parse_chart(symbol, &body)
            .map_err(|e| FetchError::NetworkFailure(format!("{e:#}")))?;

        if series.is_empty() {
            return Err(FetchError::EmptySeries);
        }

        debug!(symbol, bars = series.len(), "price history fetched");
        Ok(series)
    }

    /// Decode the chart payload into a [`PriceSeries`].
    ///
    /// Bars where either close or timestamp is null are dropped; a null
    /// volume is kept as 0 (thin instruments report price without volume).
    fn parse_chart(symbol: &str, body: &serde_json::Value) -> Result<PriceSeries> {
        if let Some(err) = body["chart"]["error"].as_object() {
            anyhow::bail!("chart API error: {:?}", err);
        }

        let result = body["chart"]["result"]
            .as_array()
            .and_then(|arr| arr.first())
            .context("chart response missing result[0]")?;

        let timestamps = result["timestamp"]
            .as_array()
            .context("chart result missing timestamp array")?;

        let quote = result["indicators"]["quote"]
            .as_array()
            .and_then(|arr| arr.first())
            .context("chart result missing indicators.quote[0]")?;

        let closes = quote["close"]
            .as_array()
            .context("quote block missing close array")?;
        let volumes = quote["volume"]
            .as_array()
            .context("quote block missing volume array")?;

        let mut points = Vec::with_capacity(timestamps.len());
        let mut skipped = 0usize;

        for (i, ts) in timestamps.iter().enumerate() {
            let timestamp = match ts.as_i64() {
                Some(t) => t,
                None => {
                    skipped += 1;
                    continue;
                }
            };
            let close = match closes.get(i).and_then(|v| v.as_f64()) {
                Some(c) if c.is_finite() => c,
                _ => {
                    skipped += 1;
                    continue;
                }
            };
            let volume = volumes.get(i).and_then(|v| v.as_i64()).unwrap_or(0);

            points.push(PricePoint {
                timestamp,
                close,
                volume,
            });
        }

        if skipped > 0 {
            warn!(symbol, skipped, "dropped null-padded bars from chart response");
        }

        Ok(PriceSeries {
            symbol: symbol.to_string(),
            points,
        })
    }
}

impl Default for QuoteClient {
    fn default() -> Self {
        Self::new("https://query1.finance.yahoo.com", "1d", "1m")
    }
}

impl MarketDataFetcher for QuoteClient {
    async fn fetch(&self, symbol: &str) -> Result<PriceSeries, FetchError> {
        self.fetch_history(symbol).await
    }
}

impl std::fmt::Debug for QuoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteClient")
            .field("base_url", &self.base_url)
            .field("range", &self.range)
            .field("interval", &self.interval)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn map_reqwest_err(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::NetworkFailure(err.to_string())
    }
}
