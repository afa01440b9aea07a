//! Candlestick (OHLCV) data structures.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a bar cannot be turned into a [`Candle`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleError {
    #[error("Malformed candle for {symbol}: open price is zero")]
    ZeroOpen { symbol: String },

    #[error("Malformed candle for {symbol}: {field} is not a finite number")]
    NonFinite { symbol: String, field: &'static str },
}

/// Raw OHLCV bar as returned by a market data source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ohlcv {
    /// Bar open time
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base asset volume traded during the bar
    pub volume: f64,
}

impl Ohlcv {
    /// Create a bar from its components.
    pub fn new(
        open_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Create a bar from a millisecond open timestamp.
    /// Returns None if the timestamp is out of range.
    pub fn from_millis(
        open_time_ms: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Option<Self> {
        let open_time = DateTime::<Utc>::from_timestamp_millis(open_time_ms)?;
        Some(Self::new(open_time, open, high, low, close, volume))
    }
}

/// Percentage change from open to close: (close - open) / open * 100
///
/// None for a zero open or when the ratio overflows.
pub fn percent_change(open: f64, close: f64) -> Option<f64> {
    if open == 0.0 {
        return None;
    }
    Some((close - open) / open * 100.0).filter(|change| change.is_finite())
}

/// One validated OHLCV bar for a symbol, with its derived percentage change.
///
/// Fields are private so `change` can only ever come from the bar's own
/// open and close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    symbol: CompactString,
    bar: Ohlcv,
    change: f64,
}

impl Candle {
    /// Validate a bar and derive its change.
    pub fn from_ohlcv(symbol: &str, bar: Ohlcv) -> Result<Self, CandleError> {
        let fields = [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
            ("volume", bar.volume),
        ];
        if let Some((field, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CandleError::NonFinite {
                symbol: symbol.to_string(),
                field: *field,
            });
        }

        if bar.open == 0.0 {
            return Err(CandleError::ZeroOpen {
                symbol: symbol.to_string(),
            });
        }
        let change = percent_change(bar.open, bar.close).ok_or_else(|| CandleError::NonFinite {
            symbol: symbol.to_string(),
            field: "change",
        })?;

        Ok(Self {
            symbol: CompactString::new(symbol),
            bar,
            change,
        })
    }

    /// Exchange instrument id this candle belongs to.
    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[inline]
    pub fn bar(&self) -> &Ohlcv {
        &self.bar
    }

    #[inline]
    pub fn open_time(&self) -> DateTime<Utc> {
        self.bar.open_time
    }

    #[inline]
    pub fn open(&self) -> f64 {
        self.bar.open
    }

    #[inline]
    pub fn high(&self) -> f64 {
        self.bar.high
    }

    #[inline]
    pub fn low(&self) -> f64 {
        self.bar.low
    }

    #[inline]
    pub fn close(&self) -> f64 {
        self.bar.close
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        self.bar.volume
    }

    /// Signed percentage change, open to close.
    #[inline]
    pub fn change(&self) -> f64 {
        self.change
    }

    /// True for a flat or rising candle.
    #[inline]
    pub fn is_up(&self) -> bool {
        self.change >= 0.0
    }
}
