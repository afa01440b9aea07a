//! Periodic pass driver.

use chrono::Utc;
use movewatch_alerts::{Notifier, PassReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Runs a notifier pass on a fixed interval.
pub struct Scheduler {
    notifier: Arc<Notifier>,
    first_delay: Duration,
    interval: Duration,
}

impl Scheduler {
    pub fn new(notifier: Arc<Notifier>, first_delay: Duration, interval: Duration) -> Self {
        Self {
            notifier,
            first_delay,
            interval,
        }
    }

    /// Run one pass immediately.
    pub async fn run_once(&self) -> PassReport {
        self.notifier.run_pass(Utc::now()).await
    }

    /// Loop forever. A slow pass delays the next tick instead of bursting.
    pub async fn run(self) {
        info!(
            first_delay_secs = self.first_delay.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Starting scheduler"
        );

        let start = tokio::time::Instant::now() + self.first_delay;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use movewatch_alerts::{MockTransport, NotificationDispatcher, NotifierConfig};
    use movewatch_core::{Ohlcv, SymbolSet, TrackedSymbol};
    use movewatch_engine::{
        DedupConfig, DedupEngine, NotificationStateStore, SignificanceEvaluator,
        SimilarityComparator,
    };
    use movewatch_feeds::{CandleFetcher, FetcherConfig, MockMarketData};
    use pretty_assertions::assert_eq;

    const ADA: &str = "ADA/USDT:USDT";

    fn notifier(market: Arc<MockMarketData>, transport: Arc<MockTransport>) -> Arc<Notifier> {
        Arc::new(Notifier::new(
            NotifierConfig {
                chat_id: 7,
                symbols: SymbolSet::new(vec![TrackedSymbol::new("ADA", ADA)]),
            },
            CandleFetcher::new(market, FetcherConfig::default()),
            SignificanceEvaluator::default(),
            DedupEngine::new(
                DedupConfig::default(),
                SimilarityComparator::default(),
                Arc::new(NotificationStateStore::new()),
            ),
            NotificationDispatcher::new(transport, true),
        ))
    }

    fn bar(close: f64) -> Ohlcv {
        let t = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();
        Ohlcv::new(t, 100.0, close.max(100.0), close.min(100.0), close, 500.0)
    }

    #[tokio::test]
    async fn test_run_once_reports_pass() {
        let market = Arc::new(MockMarketData::new());
        let transport = Arc::new(MockTransport::new());
        market.set_candle(ADA, bar(103.0));

        let scheduler = Scheduler::new(
            notifier(market.clone(), transport.clone()),
            Duration::ZERO,
            Duration::from_secs(30),
        );
        let report = scheduler.run_once().await;

        assert_eq!(report.notified, 1);
        assert_eq!(transport.sent_count(), 1);

        // same candle inside the cooldown
        let report = scheduler.run_once().await;
        assert_eq!(report.suppressed, 1);
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_run_ticks_repeatedly() {
        let market = Arc::new(MockMarketData::new());
        let transport = Arc::new(MockTransport::new());
        market.set_candle(ADA, bar(100.2));

        let scheduler = Scheduler::new(
            notifier(market.clone(), transport),
            Duration::from_millis(10),
            Duration::from_millis(20),
        );
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        assert!(market.calls() >= 3);
    }

    #[tokio::test]
    async fn test_first_delay_holds_first_pass() {
        let market = Arc::new(MockMarketData::new());
        let transport = Arc::new(MockTransport::new());

        let scheduler = Scheduler::new(
            notifier(market.clone(), transport),
            Duration::from_secs(60),
            Duration::from_millis(10),
        );
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(market.calls(), 0);
    }
}
