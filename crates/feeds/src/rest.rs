//! REST API candle fetchers.
//!
//! Polls exchange kline endpoints for the most recent bar of an instrument.

use crate::error::FeedError;
use crate::source::MarketDataSource;
use async_trait::async_trait;
use movewatch_core::{Ohlcv, Timeframe};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Bybit v5 market category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BybitCategory {
    Spot,
    Linear,
    Inverse,
}

impl BybitCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BybitCategory::Spot => "spot",
            BybitCategory::Linear => "linear",
            BybitCategory::Inverse => "inverse",
        }
    }
}

/// Bybit-native market for a unified instrument id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BybitMarket {
    pub category: BybitCategory,
    pub symbol: String,
}

impl BybitMarket {
    /// Resolve a unified instrument id.
    ///
    /// - `ADA/USDT:USDT` -> linear `ADAUSDT`
    /// - `BTC/USDC:USDC` -> linear `BTCPERP`
    /// - `BTC/USD:BTC`   -> inverse `BTCUSD`
    /// - `ADA/USDT`      -> spot `ADAUSDT`
    /// - `ADAUSDT`       -> linear `ADAUSDT` (native id passed through)
    pub fn resolve(instrument: &str) -> Result<Self, FeedError> {
        let unsupported = || FeedError::UnsupportedInstrument(instrument.to_string());
        let instrument = instrument.trim().to_uppercase();
        if instrument.is_empty() {
            return Err(unsupported());
        }

        let (pair, settle) = match instrument.split_once(':') {
            Some((pair, settle)) => (pair, Some(settle)),
            None => (instrument.as_str(), None),
        };

        let Some((base, quote)) = pair.split_once('/') else {
            if settle.is_some() || !pair.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(unsupported());
            }
            return Ok(Self {
                category: BybitCategory::Linear,
                symbol: pair.to_string(),
            });
        };

        if base.is_empty() || quote.is_empty() {
            return Err(unsupported());
        }

        let market = match settle {
            None => Self {
                category: BybitCategory::Spot,
                symbol: format!("{base}{quote}"),
            },
            Some("USDC") if quote == "USDC" => Self {
                category: BybitCategory::Linear,
                symbol: format!("{base}PERP"),
            },
            Some(settle) if settle == quote => Self {
                category: BybitCategory::Linear,
                symbol: format!("{base}{quote}"),
            },
            Some(settle) if settle == base => Self {
                category: BybitCategory::Inverse,
                symbol: format!("{base}{quote}"),
            },
            Some(_) => return Err(unsupported()),
        };
        Ok(market)
    }
}

/// Bybit kline interval parameter.
pub fn bybit_interval(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::M1 => "1",
        Timeframe::M3 => "3",
        Timeframe::M5 => "5",
        Timeframe::M15 => "15",
        Timeframe::M30 => "30",
        Timeframe::H1 => "60",
        Timeframe::H2 => "120",
        Timeframe::H4 => "240",
        Timeframe::H6 => "360",
        Timeframe::H12 => "720",
        Timeframe::D1 => "D",
        Timeframe::W1 => "W",
        Timeframe::Mo1 => "M",
    }
}

#[derive(Debug, Deserialize)]
struct BybitResponse {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    #[serde(default)]
    result: Option<BybitKlineResult>,
}

#[derive(Debug, Deserialize)]
struct BybitKlineResult {
    /// Newest first: [startTime, open, high, low, close, volume, turnover]
    #[serde(default)]
    list: Vec<Vec<String>>,
}

/// Parse a Bybit kline response body and return the newest bar.
pub fn parse_bybit_kline(body: &str, instrument: &str) -> Result<Ohlcv, FeedError> {
    let response: BybitResponse = serde_json::from_str(body)?;

    match response.ret_code {
        0 => {}
        10006 => return Err(FeedError::RateLimitExceeded),
        10003 | 10004 | 10005 => {
            return Err(FeedError::AuthenticationFailed(response.ret_msg));
        }
        // params error / symbol invalid
        10001 => return Err(FeedError::UnsupportedInstrument(instrument.to_string())),
        code => {
            return Err(FeedError::Rejected {
                code,
                message: response.ret_msg,
            })
        }
    }

    let list = response.result.map(|r| r.list).unwrap_or_default();
    let newest = list
        .first()
        .ok_or_else(|| FeedError::NoData(instrument.to_string()))?;

    if newest.len() < 6 {
        return Err(FeedError::ParseError(format!(
            "kline entry has {} fields, expected at least 6",
            newest.len()
        )));
    }

    let number = |idx: usize, name: &str| -> Result<f64, FeedError> {
        newest[idx]
            .parse::<f64>()
            .map_err(|_| FeedError::ParseError(format!("Invalid {}: {}", name, newest[idx])))
    };

    let start_ms = newest[0]
        .parse::<i64>()
        .map_err(|_| FeedError::ParseError(format!("Invalid start time: {}", newest[0])))?;

    Ohlcv::from_millis(
        start_ms,
        number(1, "open")?,
        number(2, "high")?,
        number(3, "low")?,
        number(4, "close")?,
        number(5, "volume")?,
    )
    .ok_or_else(|| FeedError::ParseError(format!("Start time out of range: {}", start_ms)))
}

/// Bybit REST API kline fetcher.
pub struct BybitRestFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl BybitRestFetcher {
    const BASE_URL: &'static str = "https://api.bybit.com";
    /// Bybit caps kline requests at 1000 bars.
    pub const MAX_LIMIT: u32 = 1000;

    /// Create a fetcher with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, FeedError> {
        Self::with_base_url(Self::BASE_URL, timeout)
    }

    /// Create a fetcher against a different host (testnet, proxy).
    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn kline_url(&self, market: &BybitMarket, timeframe: Timeframe, limit: u32) -> String {
        format!(
            "{}/v5/market/kline?category={}&symbol={}&interval={}&limit={}",
            self.base_url,
            market.category.as_str(),
            market.symbol,
            bybit_interval(timeframe),
            limit.clamp(1, Self::MAX_LIMIT)
        )
    }
}

#[async_trait]
impl MarketDataSource for BybitRestFetcher {
    async fn fetch_latest_candle(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Ohlcv, FeedError> {
        let market = BybitMarket::resolve(instrument)?;
        let url = self.kline_url(&market, timeframe, limit);
        debug!("Bybit: Fetching klines {}", url);

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::RateLimitExceeded);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(FeedError::AuthenticationFailed(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(FeedError::ConnectionFailed(format!("HTTP {}", status)));
        }

        let body = response.text().await?;
        parse_bybit_kline(&body, instrument)
    }
}
