//! Candle similarity used for alert deduplication.

use movewatch_core::Candle;

/// Thresholds below which two candles count as the same event.
#[derive(Debug, Clone)]
pub struct SimilarityConfig {
    /// Maximum relative difference in percent change.
    pub max_change_diff: f64,
    /// Maximum relative difference in volume.
    pub max_volume_diff: f64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            max_change_diff: 0.2,
            max_volume_diff: 0.3,
        }
    }
}

/// Relative differences between a reference candle and another candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandleDiff {
    /// |a.change - b.change| / max(|a.change|, 1)
    pub change_diff: f64,
    /// |a.volume - b.volume| / max(a.volume, 1)
    pub volume_diff: f64,
}

impl CandleDiff {
    /// Differences of `other` relative to `reference`. The floor of 1 keeps
    /// near-zero references from blowing up the ratio.
    pub fn between(reference: &Candle, other: &Candle) -> Self {
        Self {
            change_diff: (reference.change() - other.change()).abs()
                / reference.change().abs().max(1.0),
            volume_diff: (reference.volume() - other.volume()).abs() / reference.volume().max(1.0),
        }
    }
}

/// Decides whether two candles represent the same market event.
#[derive(Debug, Clone, Default)]
pub struct SimilarityComparator {
    config: SimilarityConfig,
}

impl SimilarityComparator {
    pub fn new(config: SimilarityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Similar iff both relative differences are under their thresholds.
    /// Nothing is similar to an absent candle.
    pub fn is_similar(&self, a: Option<&Candle>, b: Option<&Candle>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => self.is_within(&CandleDiff::between(a, b)),
            _ => false,
        }
    }

    #[inline]
    pub fn is_within(&self, diff: &CandleDiff) -> bool {
        diff.change_diff < self.config.max_change_diff
            && diff.volume_diff < self.config.max_volume_diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use movewatch_core::Ohlcv;

    fn candle(open: f64, close: f64, volume: f64) -> Candle {
        let t = Utc.with_ymd_and_hms(2026, 2, 2, 10, 0, 0).unwrap();
        let bar = Ohlcv::new(t, open, open.max(close), open.min(close), close, volume);
        Candle::from_ohlcv("ADA/USDT:USDT", bar).unwrap()
    }

    #[test]
    fn test_absent_is_never_similar() {
        let cmp = SimilarityComparator::default();
        let c = candle(100.0, 102.0, 1000.0);
        assert!(!cmp.is_similar(None, Some(&c)));
        assert!(!cmp.is_similar(Some(&c), None));
        assert!(!cmp.is_similar(None, None));
    }

    #[test]
    fn test_identical_change_and_volume_are_similar() {
        let cmp = SimilarityComparator::default();
        for (open, close, volume) in [(100.0, 102.0, 1000.0), (1.0, 0.9, 0.0), (3.0, 3.0, 5.5)] {
            let a = candle(open, close, volume);
            let b = candle(open * 2.0, close * 2.0, volume);
            assert!(cmp.is_similar(Some(&a), Some(&b)));
        }
    }

    #[test]
    fn test_small_differences_are_similar() {
        // change 2.0 vs 1.8, volume 1000 vs 1050
        let cmp = SimilarityComparator::default();
        let a = candle(100.0, 102.0, 1000.0);
        let b = candle(100.0, 101.8, 1050.0);

        let diff = CandleDiff::between(&a, &b);
        assert!((diff.change_diff - 0.1).abs() < 1e-9);
        assert!((diff.volume_diff - 0.05).abs() < 1e-9);
        assert!(cmp.is_similar(Some(&a), Some(&b)));
    }

    #[test]
    fn test_change_diff_over_threshold_is_not_similar() {
        let cmp = SimilarityComparator::default();
        let a = candle(100.0, 105.0, 1000.0);
        // |5 - 3.9| / 5 = 0.22
        let b = candle(100.0, 103.9, 1000.0);
        assert!(!cmp.is_similar(Some(&a), Some(&b)));

        // direction flip
        let c = candle(100.0, 95.0, 1000.0);
        assert!(!cmp.is_similar(Some(&a), Some(&c)));
    }

    #[test]
    fn test_change_diff_at_threshold_is_not_similar() {
        let cmp = SimilarityComparator::default();
        // change 10.0 vs 8.0: |10 - 8| / 10 = 0.2, volume identical
        let a = candle(100.0, 110.0, 1000.0);
        let b = candle(100.0, 108.0, 1000.0);

        let diff = CandleDiff::between(&a, &b);
        assert_eq!(diff.change_diff, 0.2);
        assert_eq!(diff.volume_diff, 0.0);
        assert!(!cmp.is_similar(Some(&a), Some(&b)));

        assert!(!cmp.is_within(&CandleDiff {
            change_diff: 0.2,
            volume_diff: 0.0,
        }));
    }

    #[test]
    fn test_volume_diff_at_threshold_is_not_similar() {
        let cmp = SimilarityComparator::default();
        let a = candle(100.0, 102.0, 1000.0);
        let b = candle(100.0, 102.0, 1300.0);
        let c = candle(100.0, 102.0, 600.0);
        assert!(!cmp.is_similar(Some(&a), Some(&b)));
        assert!(!cmp.is_similar(Some(&a), Some(&c)));
    }

    #[test]
    fn test_floor_of_one_for_small_references() {
        // change 0.5 vs 0.6: raw ratio 0.2, floored denominator gives 0.1
        let cmp = SimilarityComparator::default();
        let a = candle(100.0, 100.5, 0.5);
        let b = candle(100.0, 100.6, 0.7);
        let diff = CandleDiff::between(&a, &b);
        assert!((diff.change_diff - 0.1).abs() < 1e-9);
        assert!((diff.volume_diff - 0.2).abs() < 1e-9);
        assert!(cmp.is_similar(Some(&a), Some(&b)));
    }

    #[test]
    fn test_custom_thresholds() {
        let cmp = SimilarityComparator::new(SimilarityConfig {
            max_change_diff: 0.05,
            max_volume_diff: 0.3,
        });
        let a = candle(100.0, 102.0, 1000.0);
        let b = candle(100.0, 101.8, 1000.0);
        assert!(!cmp.is_similar(Some(&a), Some(&b)));
    }
}
