//! Market data source abstraction and the candle fetcher adapter.

use crate::error::FeedError;
use async_trait::async_trait;
use movewatch_core::{Ohlcv, Timeframe};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Trait for exchange market data clients.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch the most recent bar for an instrument.
    /// `limit` is the number of bars requested from the exchange.
    async fn fetch_latest_candle(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Ohlcv, FeedError>;
}

/// Result of one fetch attempt, as consumed by the per-symbol loop.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Latest bar is available.
    Candle(Ohlcv),
    /// Transient or data problem; try again next cycle.
    Unavailable(FeedError),
    /// Permanent problem that will repeat every cycle until fixed.
    Failed(FeedError),
}

impl FetchOutcome {
    pub fn candle(&self) -> Option<&Ohlcv> {
        match self {
            FetchOutcome::Candle(bar) => Some(bar),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FeedError> {
        match self {
            FetchOutcome::Candle(_) => None,
            FetchOutcome::Unavailable(e) | FetchOutcome::Failed(e) => Some(e),
        }
    }
}

impl From<Result<Ohlcv, FeedError>> for FetchOutcome {
    fn from(result: Result<Ohlcv, FeedError>) -> Self {
        match result {
            Ok(bar) => FetchOutcome::Candle(bar),
            Err(e) if e.is_permanent() => FetchOutcome::Failed(e),
            Err(e) => FetchOutcome::Unavailable(e),
        }
    }
}

/// Configuration for the candle fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeframe: Timeframe,
    /// Bars requested per call.
    pub limit: u32,
    /// Upper bound on a single fetch.
    pub timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::M15,
            limit: 200,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Wraps a [`MarketDataSource`] with a timeout and turns every failure into
/// a [`FetchOutcome`] so a single instrument can never abort a pass.
#[derive(Clone)]
pub struct CandleFetcher {
    source: Arc<dyn MarketDataSource>,
    config: FetcherConfig,
}

impl CandleFetcher {
    pub fn new(source: Arc<dyn MarketDataSource>, config: FetcherConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetch the latest bar for an instrument.
    pub async fn fetch(&self, instrument: &str) -> FetchOutcome {
        let call =
            self.source
                .fetch_latest_candle(instrument, self.config.timeframe, self.config.limit);

        let result = match tokio::time::timeout(self.config.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::Timeout(format!(
                "{} after {:?}",
                instrument, self.config.timeout
            ))),
        };

        let outcome = FetchOutcome::from(result);
        match &outcome {
            FetchOutcome::Candle(bar) => {
                debug!(
                    instrument = instrument,
                    open = bar.open,
                    close = bar.close,
                    "Fetched candle"
                );
            }
            FetchOutcome::Unavailable(e) => {
                warn!(instrument = instrument, error = %e, "Candle unavailable this cycle");
            }
            FetchOutcome::Failed(e) => {
                error!(instrument = instrument, error = %e, "Candle fetch failed");
            }
        }
        outcome
    }
}

/// Mock market data source for testing.
#[derive(Default)]
pub struct MockMarketData {
    responses: Mutex<HashMap<String, Result<Ohlcv, FeedError>>>,
    delay: Option<Duration>,
    calls: AtomicU64,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the bar returned for an instrument.
    pub fn set_candle(&self, instrument: &str, bar: Ohlcv) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(instrument.to_string(), Ok(bar));
        }
    }

    /// Make fetches for an instrument fail.
    pub fn set_error(&self, instrument: &str, error: FeedError) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(instrument.to_string(), Err(error));
        }
    }

    /// Number of fetches served so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for MockMarketData {
    async fn fetch_latest_candle(
        &self,
        instrument: &str,
        _timeframe: Timeframe,
        _limit: u32,
    ) -> Result<Ohlcv, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let responses = self
            .responses
            .lock()
            .map_err(|_| FeedError::ConnectionFailed("mock poisoned".to_string()))?;
        responses
            .get(instrument)
            .cloned()
            .unwrap_or_else(|| Err(FeedError::NoData(instrument.to_string())))
    }
}
