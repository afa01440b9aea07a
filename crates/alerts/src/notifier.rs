//! Alert notification logic.
//!
//! Runs the per-symbol pipeline (fetch, evaluate, dedup, deliver) for the
//! scheduled pass and for on-demand queries.

use crate::dispatcher::{Delivery, NotificationDispatcher};
use crate::message::{
    format_candle_message, format_duplicate_message, format_no_move_message,
    format_startup_message, format_unavailable_message, format_unknown_symbol_message,
    symbol_keyboard,
};
use crate::transport::{ActionButton, DispatchError};
use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use movewatch_core::{percent_change, MessageHandle, SymbolSet, TrackedSymbol};
use movewatch_engine::{Decision, DedupEngine, NotifyReason, SignificanceEvaluator};
use movewatch_feeds::{CandleFetcher, FeedError, FetchOutcome};
use tracing::{debug, error, info, warn};

/// Configuration for the notifier.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Chat receiving scheduled alerts.
    pub chat_id: i64,
    /// Symbols evaluated on every pass.
    pub symbols: SymbolSet,
}

/// What happened to one symbol in a pass or query.
#[derive(Debug)]
pub enum SymbolOutcome {
    /// Alert delivered.
    Notified {
        reason: NotifyReason,
        delivery: Delivery,
        change: f64,
    },
    /// Significant, but the same event was notified recently.
    Duplicate { elapsed: Duration },
    /// Latest candle is below the threshold (or malformed, with no change).
    Quiet { change: Option<f64> },
    /// Market data was not available this cycle.
    Unavailable(FeedError),
    /// Delivery failed; the dedup state was rolled back.
    DeliveryFailed(DispatchError),
}

/// Counters for one scheduled pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub notified: u32,
    pub suppressed: u32,
    pub quiet: u32,
    pub failed: u32,
}

impl PassReport {
    fn record(&mut self, outcome: &SymbolOutcome) {
        match outcome {
            SymbolOutcome::Notified { .. } => self.notified += 1,
            SymbolOutcome::Duplicate { .. } => self.suppressed += 1,
            SymbolOutcome::Quiet { .. } => self.quiet += 1,
            SymbolOutcome::Unavailable(_) | SymbolOutcome::DeliveryFailed(_) => self.failed += 1,
        }
    }
}

/// Result of an on-demand query.
#[derive(Debug)]
pub enum QueryOutcome {
    /// The name does not match a tracked symbol.
    UnknownSymbol,
    /// The symbol was evaluated; non-notified outcomes were answered with
    /// an explanatory reply.
    Evaluated(SymbolOutcome),
}

/// Alert notifier driving the dedup engine and the dispatcher.
pub struct Notifier {
    config: NotifierConfig,
    fetcher: CandleFetcher,
    evaluator: SignificanceEvaluator,
    engine: DedupEngine,
    dispatcher: NotificationDispatcher,
    keyboard: Vec<ActionButton>,
}

impl Notifier {
    /// Create a new notifier.
    pub fn new(
        config: NotifierConfig,
        fetcher: CandleFetcher,
        evaluator: SignificanceEvaluator,
        engine: DedupEngine,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        let keyboard = symbol_keyboard(&config.symbols);
        Self {
            config,
            fetcher,
            evaluator,
            engine,
            dispatcher,
            keyboard,
        }
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn engine(&self) -> &DedupEngine {
        &self.engine
    }

    pub fn threshold(&self) -> f64 {
        self.evaluator.threshold()
    }

    /// Buttons attached to every message.
    pub fn keyboard(&self) -> &[ActionButton] {
        &self.keyboard
    }

    /// Send the startup announcement to the alert chat.
    pub async fn announce_startup(&self) -> Result<(), DispatchError> {
        let text = format_startup_message(self.fetcher.config().timeframe, self.threshold());
        self.dispatcher.announce(self.config.chat_id, &text).await?;
        Ok(())
    }

    /// Evaluate every tracked symbol once and deliver alerts to the alert chat.
    /// Symbols are processed concurrently; one failing never stops the others.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> PassReport {
        let futures = self
            .config
            .symbols
            .iter()
            .map(|symbol| self.process_symbol(symbol, self.config.chat_id, now));
        let outcomes = join_all(futures).await;

        let mut report = PassReport::default();
        for outcome in &outcomes {
            report.record(outcome);
        }

        if report.notified > 0 || report.failed > 0 {
            info!(
                notified = report.notified,
                suppressed = report.suppressed,
                quiet = report.quiet,
                failed = report.failed,
                "Pass complete"
            );
        } else {
            debug!(
                suppressed = report.suppressed,
                quiet = report.quiet,
                "Pass complete"
            );
        }
        report
    }

    /// Evaluate one symbol for a user request and answer in `chat_id`.
    ///
    /// Alerts go through the same dedup engine as the scheduled pass. Any
    /// other outcome is answered with an explanation, editing `origin`
    /// (the message holding the pressed button) when possible.
    pub async fn query(
        &self,
        name: &str,
        chat_id: i64,
        origin: Option<MessageHandle>,
        now: DateTime<Utc>,
    ) -> Result<QueryOutcome, DispatchError> {
        let Some(symbol) = self.config.symbols.by_name(name) else {
            warn!(name = name, "Query for untracked symbol");
            let text = format_unknown_symbol_message(name);
            self.dispatcher
                .deliver(chat_id, origin, &text, &self.keyboard)
                .await?;
            return Ok(QueryOutcome::UnknownSymbol);
        };

        let outcome = self.process_symbol(symbol, chat_id, now).await;
        let instrument = symbol.instrument.as_str();
        let reply = match &outcome {
            SymbolOutcome::Notified { .. } => None,
            SymbolOutcome::Duplicate { elapsed } => {
                Some(format_duplicate_message(instrument, elapsed.num_seconds()))
            }
            SymbolOutcome::Quiet { change } => {
                Some(format_no_move_message(instrument, self.threshold(), *change))
            }
            SymbolOutcome::Unavailable(_) => Some(format_unavailable_message(instrument)),
            SymbolOutcome::DeliveryFailed(_) => None,
        };

        if let Some(text) = reply {
            self.dispatcher
                .deliver(chat_id, origin, &text, &self.keyboard)
                .await?;
        }

        Ok(QueryOutcome::Evaluated(outcome))
    }

    /// Fetch, evaluate, decide and deliver for one symbol.
    pub async fn process_symbol(
        &self,
        symbol: &TrackedSymbol,
        chat_id: i64,
        now: DateTime<Utc>,
    ) -> SymbolOutcome {
        let instrument = symbol.instrument.as_str();

        let bar = match self.fetcher.fetch(instrument).await {
            FetchOutcome::Candle(bar) => bar,
            FetchOutcome::Unavailable(e) | FetchOutcome::Failed(e) => {
                return SymbolOutcome::Unavailable(e);
            }
        };

        let candle = match self.evaluator.evaluate(instrument, &bar) {
            Ok(Some(candle)) => candle,
            Ok(None) => {
                return SymbolOutcome::Quiet {
                    change: percent_change(bar.open, bar.close),
                };
            }
            Err(e) => {
                warn!(instrument = instrument, error = %e, "Malformed candle, treating as not significant");
                return SymbolOutcome::Quiet { change: None };
            }
        };

        let ticket = match self.engine.decide(instrument, Some(&candle), now) {
            Decision::Notify(ticket) => ticket,
            Decision::Suppress { elapsed, .. } => return SymbolOutcome::Duplicate { elapsed },
            Decision::Skip => return SymbolOutcome::Quiet { change: None },
        };

        let text = format_candle_message(&candle);
        match self
            .dispatcher
            .deliver(chat_id, ticket.previous_handle(), &text, &self.keyboard)
            .await
        {
            Ok(delivery) => {
                self.engine.confirm(&ticket, delivery.handle);
                info!(
                    symbol = %symbol.name,
                    change = candle.change(),
                    reason = ?ticket.reason,
                    edited = delivery.edited,
                    "Alert sent"
                );
                SymbolOutcome::Notified {
                    reason: ticket.reason,
                    delivery,
                    change: candle.change(),
                }
            }
            Err(e) => {
                let rolled_back = self.engine.rollback(&ticket);
                error!(
                    symbol = %symbol.name,
                    error = %e,
                    rolled_back = rolled_back,
                    "Failed to send alert"
                );
                SymbolOutcome::DeliveryFailed(e)
            }
        }
    }
}
