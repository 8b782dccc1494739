// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator maths for the screener. Everything here is
// deterministic: the same close series always produces bit-identical output,
// and insufficient input is a typed error rather than a NaN.

pub mod macd;
pub mod rsi;

use serde::{Deserialize, Serialize};

// =============================================================================
// Parameters
// =============================================================================

fn default_rsi_period() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

/// Tunable indicator windows. Defaults are RSI(14) and MACD(12, 26, 9).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorParams {
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
        }
    }
}

impl IndicatorParams {
    /// Minimum number of closes needed before `compute` will produce output:
    /// the slow EMA span plus one sample to emit a value, or one full RSI
    /// window of deltas, whichever is larger. 27 with the defaults.
    pub fn min_samples(&self) -> usize {
        (self.macd_slow + 1).max(self.rsi_period + 1)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// The close series is too short for the configured windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsufficientData {
    pub got: usize,
    pub required: usize,
}

impl std::fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "insufficient data: got {} samples, need at least {}",
            self.got, self.required
        )
    }
}

impl std::error::Error for InsufficientData {}

// =============================================================================
// Output
// =============================================================================

/// Latest indicator values for one symbol.
///
/// Invariant: `macd_hist == macd - macd_signal` exactly — the histogram is
/// derived in the constructor and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
}

impl IndicatorSnapshot {
    fn new(rsi: f64, macd: f64, macd_signal: f64) -> Self {
        Self {
            rsi,
            macd,
            macd_signal,
            macd_hist: macd - macd_signal,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Compute the latest RSI and MACD values for an ordered close series
/// (oldest first, most recent last).
///
/// Fails with [`InsufficientData`] when `closes` is shorter than
/// [`IndicatorParams::min_samples`].
pub fn compute(closes: &[f64], params: &IndicatorParams) -> Result<IndicatorSnapshot, InsufficientData> {
    let required = params.min_samples();
    if closes.len() < required {
        return Err(InsufficientData {
            got: closes.len(),
            required,
        });
    }

    // Both lookups are guaranteed to succeed past the length gate; treat a
    // miss as the same precondition violation rather than panicking.
    let rsi = rsi::latest_rsi(closes, params.rsi_period).ok_or(InsufficientData {
        got: closes.len(),
        required,
    })?;
    let (macd, signal) = macd::macd_lines(
        closes,
        params.macd_fast,
        params.macd_slow,
        params.macd_signal,
    )
    .ok_or(InsufficientData {
        got: closes.len(),
        required,
    })?;

    Ok(IndicatorSnapshot::new(rsi, macd, signal))
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> IndicatorParams {
        IndicatorParams::default()
    }

    #[test]
    fn min_samples_default_is_27() {
        assert_eq!(params().min_samples(), 27);
    }

    #[test]
    fn rejects_short_series() {
        let closes = vec![100.0; 26];
        let err = compute(&closes, &params()).unwrap_err();
        assert_eq!(err.got, 26);
        assert_eq!(err.required, 27);
    }

    #[test]
    fn accepts_exactly_min_samples() {
        let closes = vec![100.0; 27];
        assert!(compute(&closes, &params()).is_ok());
    }

    #[test]
    fn flat_series_yields_neutral_rsi_and_zero_histogram() {
        let closes = vec![250.5; 40];
        let snap = compute(&closes, &params()).unwrap();
        assert!((snap.rsi - 50.0).abs() < 1e-12);
        assert!(snap.macd.abs() < 1e-12);
        assert!(snap.macd_signal.abs() < 1e-12);
        assert!(snap.macd_hist.abs() < 1e-12);
    }

    #[test]
    fn histogram_identity_holds() {
        let closes: Vec<f64> = (0..60).map(|i| 80.0 + (i as f64 * 0.45).sin() * 4.0).collect();
        let snap = compute(&closes, &params()).unwrap();
        assert_eq!(snap.macd_hist, snap.macd - snap.macd_signal);
    }

    #[test]
    fn rsi_bounded_for_arbitrary_series() {
        let closes: Vec<f64> = (0..100)
            .map(|i| 120.0 + ((i * 7919) % 23) as f64 - ((i * 104729) % 17) as f64)
            .collect();
        let snap = compute(&closes, &params()).unwrap();
        assert!((0.0..=100.0).contains(&snap.rsi));
    }

    #[test]
    fn recomputation_is_bit_identical() {
        let closes: Vec<f64> = (0..80).map(|i| 90.0 + (i as f64 * 1.3).cos() * 7.0).collect();
        let a = compute(&closes, &params()).unwrap();
        let b = compute(&closes, &params()).unwrap();
        assert_eq!(a, b);
    }
}
