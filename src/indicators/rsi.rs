// =============================================================================
// Relative Strength Index (RSI) — simple rolling mean
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an instrument is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Average gain / average loss = plain mean of the gains / losses in
//          the trailing `period`-delta window (a rolling SMA, not Wilder's
//          recursive smoothing — this matches the upstream screener maths).
// Step 3 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Thresholds:  RSI >= 70 => Overbought,  RSI <= 30 => Oversold.
// =============================================================================

/// Compute the RSI series for the given `closes` and `period`.
///
/// The returned vector holds one RSI value per close starting at index
/// `period` (the first `period` deltas are consumed to fill the window).
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `closes.len() < period + 1` => empty vec (need at least `period` deltas)
/// - Window with no losses => 100.0; window with no movement at all => 50.0.
///   Both are handled explicitly so the division never produces NaN or ∞.
pub fn rolling_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let period_f = period as f64;

    deltas
        .windows(period)
        .map(|window| {
            let (sum_gain, sum_loss) =
                window.iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
                    if d > 0.0 {
                        (g + d, l)
                    } else {
                        (g, l + d.abs())
                    }
                });
            rsi_from_averages(sum_gain / period_f, sum_loss / period_f)
        })
        .collect()
}

/// Most recent RSI value for `closes`, or `None` when the series is too
/// short to fill a single window.
pub fn latest_rsi(closes: &[f64], period: usize) -> Option<f64> {
    rolling_rsi(closes, period).last().copied()
}

/// Human-readable classification of an RSI value.
pub fn rsi_label(value: f64) -> &'static str {
    if value >= 70.0 {
        "Overbought"
    } else if value <= 30.0 {
        "Oversold"
    } else {
        "Neutral"
    }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// - Both averages zero (flat window) => 50.0.
/// - Average loss zero (only gains)   => 100.0.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}
