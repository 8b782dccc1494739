// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
// MACD is the difference between a fast and a slow exponential moving
// average of price; the signal line is an EMA of the MACD line itself.
//
// Formula:
//   multiplier = 2 / (span + 1)
//   EMA_0      = value_0
//   EMA_t      = value_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// Seeding with the raw first value (rather than an SMA warm-up) reproduces
// the `adjust=false` exponential recurrence of the upstream screener, so a
// series of length N always yields N EMA values.
// =============================================================================

/// Compute the EMA series for `values` with the given `span`.
///
/// Output has the same length as the input; `out[0] == values[0]`.
///
/// # Edge cases
/// - `span == 0` or empty input => empty vec
/// - A non-finite input value poisons everything after it; callers feeding
///   exchange data should have filtered nulls already.
pub fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || values.is_empty() {
        return Vec::new();
    }

    let multiplier = 2.0 / (span + 1) as f64;

    let mut result = Vec::with_capacity(values.len());
    let mut prev = values[0];
    result.push(prev);

    for &value in &values[1..] {
        prev = value * multiplier + prev * (1.0 - multiplier);
        result.push(prev);
    }

    result
}

/// Latest MACD line and signal line values for `closes`.
///
/// `macd[i] = fast_ema[i] - slow_ema[i]`; the signal line is the
/// `signal_span` EMA over the full MACD series. Returns `None` when the
/// series is empty or any span is zero. The histogram is *not* returned
/// here — it is always derived as `macd - signal` by the caller so the
/// identity can never drift.
pub fn macd_lines(
    closes: &[f64],
    fast_span: usize,
    slow_span: usize,
    signal_span: usize,
) -> Option<(f64, f64)> {
    let fast = ema_series(closes, fast_span);
    let slow = ema_series(closes, slow_span);
    if fast.is_empty() || slow.is_empty() {
        return None;
    }

    let macd: Vec<f64> = fast.iter().zip(slow.iter()).map(|(f, s)| f - s).collect();
    let signal = ema_series(&macd, signal_span);

    Some((*macd.last()?, *signal.last()?))
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    // ---- ema_series ------------------------------------------------------

    #[test]
    fn ema_empty_input() {
        assert!(ema_series(&[], 12).is_empty());
    }

    #[test]
    fn ema_span_zero() {
        assert!(ema_series(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn ema_single_value_is_identity() {
        let out = ema_series(&[42.0], 12);
        assert_eq!(out, vec![42.0]);
    }

    #[test]
    fn ema_known_recurrence() {
        // span 3 => multiplier = 0.5; seed = first value.
        let out = ema_series(&[2.0, 4.0, 8.0], 3);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 2.0).abs() < 1e-12);
        assert!((out[1] - 3.0).abs() < 1e-12); // 4*0.5 + 2*0.5
        assert!((out[2] - 5.5).abs() < 1e-12); // 8*0.5 + 3*0.5
    }

    #[test]
    fn ema_flat_series_stays_flat() {
        let out = ema_series(&[7.0; 50], 26);
        for &v in &out {
            assert!((v - 7.0).abs() < 1e-12);
        }
    }

    #[test]
    fn ema_output_length_matches_input() {
        let closes: Vec<f64> = (1..=40).map(|x| x as f64).collect();
        assert_eq!(ema_series(&closes, 26).len(), closes.len());
    }

    // ---- macd_lines ------------------------------------------------------

    #[test]
    fn macd_empty_input() {
        assert!(macd_lines(&[], 12, 26, 9).is_none());
    }

    #[test]
    fn macd_flat_series_is_zero() {
        let (macd, signal) = macd_lines(&[100.0; 40], 12, 26, 9).unwrap();
        assert!(macd.abs() < 1e-12);
        assert!(signal.abs() < 1e-12);
    }

    #[test]
    fn macd_positive_in_uptrend() {
        // In a steady uptrend the fast EMA sits above the slow EMA.
        let closes: Vec<f64> = (1..=60).map(|x| x as f64).collect();
        let (macd, _signal) = macd_lines(&closes, 12, 26, 9).unwrap();
        assert!(macd > 0.0, "expected positive MACD, got {macd}");
    }

    #[test]
    fn macd_negative_in_downtrend() {
        let closes: Vec<f64> = (1..=60).rev().map(|x| x as f64).collect();
        let (macd, _signal) = macd_lines(&closes, 12, 26, 9).unwrap();
        assert!(macd < 0.0, "expected negative MACD, got {macd}");
    }

    #[test]
    fn macd_deterministic() {
        let closes: Vec<f64> = (0..60).map(|i| 50.0 + (i as f64 * 0.3).cos() * 5.0).collect();
        let a = macd_lines(&closes, 12, 26, 9).unwrap();
        let b = macd_lines(&closes, 12, 26, 9).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn macd_hand_computed_small_case() {
        // spans (1, 2, 1): fast EMA = the closes themselves, slow EMA with
        // multiplier 2/3, signal = MACD line itself.
        let closes = [3.0, 6.0];
        let (macd, signal) = macd_lines(&closes, 1, 2, 1).unwrap();
        // slow: [3, 6*(2/3) + 3*(1/3) = 5]; macd = [0, 1]; signal = macd.
        assert!((macd - 1.0).abs() < 1e-12);
        assert!((signal - 1.0).abs() < 1e-12);
    }
}
