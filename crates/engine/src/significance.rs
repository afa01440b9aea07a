//! Significant move detection.

use movewatch_core::{Candle, CandleError, Ohlcv};

/// Configuration for the significance evaluator.
#[derive(Debug, Clone)]
pub struct SignificanceConfig {
    /// Minimum absolute percent change for a candle to be significant.
    pub min_percent_change: f64,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        Self {
            min_percent_change: 1.67,
        }
    }
}

/// Decides whether a candle moved enough to be worth an alert.
#[derive(Debug, Clone, Default)]
pub struct SignificanceEvaluator {
    config: SignificanceConfig,
}

impl SignificanceEvaluator {
    pub fn new(config: SignificanceConfig) -> Self {
        Self { config }
    }

    pub fn threshold(&self) -> f64 {
        self.config.min_percent_change
    }

    /// Check an already validated candle against the threshold.
    #[inline]
    pub fn is_significant(&self, candle: &Candle) -> bool {
        candle.change().abs() >= self.config.min_percent_change
    }

    /// Validate a raw bar and keep it only if it is significant.
    ///
    /// A zero open price or non-finite field is an error, never an
    /// infinite or NaN change.
    pub fn evaluate(&self, symbol: &str, bar: &Ohlcv) -> Result<Option<Candle>, CandleError> {
        let candle = Candle::from_ohlcv(symbol, *bar)?;
        Ok(self.is_significant(&candle).then_some(candle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(open: f64, close: f64) -> Ohlcv {
        let t = Utc.with_ymd_and_hms(2026, 2, 2, 10, 0, 0).unwrap();
        Ohlcv::new(t, open, open.max(close), open.min(close), close, 1000.0)
    }

    #[test]
    fn test_default_threshold() {
        assert_eq!(SignificanceEvaluator::default().threshold(), 1.67);
    }

    #[test]
    fn test_below_threshold_is_absent() {
        let evaluator = SignificanceEvaluator::default();
        for close in [100.0, 100.5, 101.0, 101.66, 99.0, 98.34] {
            assert!(
                evaluator.evaluate("ADA", &bar(100.0, close)).unwrap().is_none(),
                "close {} should not be significant",
                close
            );
        }
    }

    #[test]
    fn test_at_or_above_threshold_is_significant() {
        let evaluator = SignificanceEvaluator::new(SignificanceConfig {
            min_percent_change: 2.0,
        });

        let up = evaluator.evaluate("ADA", &bar(100.0, 102.0)).unwrap().unwrap();
        assert!((up.change() - 2.0).abs() < 1e-9);

        let down = evaluator.evaluate("ADA", &bar(100.0, 95.0)).unwrap().unwrap();
        assert!((down.change() + 5.0).abs() < 1e-9);
        assert_eq!(down.symbol(), "ADA");
    }

    #[test]
    fn test_zero_open_fails_explicitly() {
        let evaluator = SignificanceEvaluator::default();
        let result = evaluator.evaluate("ETH", &bar(0.0, 10.0));
        assert!(matches!(result, Err(CandleError::ZeroOpen { .. })));
    }
}
