// =============================================================================
// MACD / Signal Crossover Detection
// =============================================================================
//
// Classifies how the MACD line sits relative to its signal line given the
// values from the previous successful cycle and the current one. Crossover
// conditions are checked before the steady-state Above/Below cases — the
// order of the match arms is load-bearing.

use serde::Serialize;

/// Qualitative MACD/signal relationship across two cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Crossover {
    /// MACD crossed above the signal line this cycle.
    Bullish,
    /// MACD crossed below the signal line this cycle.
    Bearish,
    /// MACD above signal, but no crossover occurred.
    Above,
    /// MACD below signal, but no crossover occurred.
    Below,
    /// Exact equality, or no previous cycle to compare against.
    #[serde(rename = "-")]
    None,
}

impl std::fmt::Display for Crossover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "Bullish"),
            Self::Bearish => write!(f, "Bearish"),
            Self::Above => write!(f, "Above"),
            Self::Below => write!(f, "Below"),
            Self::None => write!(f, "-"),
        }
    }
}

impl Default for Crossover {
    fn default() -> Self {
        Self::None
    }
}

/// Classify the crossover state from the previous and current MACD/signal
/// pairs.
///
/// A `None` previous pair means this is the symbol's first successful cycle,
/// which can never be a crossover. The function is pure: identical inputs
/// always yield the identical label.
pub fn classify(
    prev_macd: Option<f64>,
    prev_signal: Option<f64>,
    macd: f64,
    signal: f64,
) -> Crossover {
    let (prev_macd, prev_signal) = match (prev_macd, prev_signal) {
        (Some(pm), Some(ps)) => (pm, ps),
        _ => return Crossover::None,
    };

    if prev_macd <= prev_signal && macd > signal {
        Crossover::Bullish
    } else if prev_macd >= prev_signal && macd < signal {
        Crossover::Bearish
    } else if macd > signal {
        Crossover::Above
    } else if macd < signal {
        Crossover::Below
    } else {
        Crossover::None
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullish_crossover() {
        // MACD moves from below the signal line to above it.
        assert_eq!(
            classify(Some(1.0), Some(1.2), 1.3, 1.1),
            Crossover::Bullish
        );
    }

    #[test]
    fn bearish_crossover() {
        // MACD moves from above the signal line to below it.
        assert_eq!(
            classify(Some(2.0), Some(1.0), 0.9, 1.0),
            Crossover::Bearish
        );
    }

    #[test]
    fn steady_above() {
        // Already above, still above — not a crossover.
        assert_eq!(classify(Some(2.0), Some(1.0), 2.5, 1.5), Crossover::Above);
    }

    #[test]
    fn steady_below() {
        assert_eq!(classify(Some(-2.0), Some(-1.0), -2.5, -1.5), Crossover::Below);
    }

    #[test]
    fn first_cycle_has_no_label() {
        assert_eq!(classify(None, None, 1.0, 0.5), Crossover::None);
        assert_eq!(classify(Some(1.0), None, 1.0, 0.5), Crossover::None);
        assert_eq!(classify(None, Some(1.0), 1.0, 0.5), Crossover::None);
    }

    #[test]
    fn exact_equality_is_none() {
        assert_eq!(classify(Some(0.5), Some(0.5), 1.0, 1.0), Crossover::None);
    }

    #[test]
    fn equality_then_move_up_is_bullish() {
        // prev_macd == prev_signal satisfies the <= precondition.
        assert_eq!(classify(Some(1.0), Some(1.0), 1.2, 1.1), Crossover::Bullish);
    }

    #[test]
    fn equality_then_move_down_is_bearish() {
        assert_eq!(classify(Some(1.0), Some(1.0), 1.0, 1.1), Crossover::Bearish);
    }

    #[test]
    fn deterministic_for_same_inputs() {
        for _ in 0..3 {
            assert_eq!(
                classify(Some(0.37), Some(0.41), 0.44, 0.40),
                Crossover::Bullish
            );
        }
    }

    #[test]
    fn display_labels() {
        assert_eq!(Crossover::Bullish.to_string(), "Bullish");
        assert_eq!(Crossover::None.to_string(), "-");
    }
}
