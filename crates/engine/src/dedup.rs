//! Alert deduplication.
//!
//! Decides per symbol whether a significant candle should be notified,
//! given what was last notified for that symbol and when.

use crate::similarity::{CandleDiff, SimilarityComparator};
use crate::store::{NotificationRecord, NotificationStateStore};
use chrono::{DateTime, Duration, Utc};
use movewatch_core::{Candle, MessageHandle};
use std::sync::Arc;
use tracing::debug;

/// Configuration for the dedup engine.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Minimum time between similar notifications for the same symbol.
    pub min_message_interval: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            min_message_interval: Duration::seconds(300),
        }
    }
}

/// Why a notification goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyReason {
    /// Nothing was notified for this symbol before.
    FirstSignal,
    /// The cooldown has expired; similarity is not consulted.
    CooldownExpired,
    /// Inside the cooldown, but the candle differs from the last one.
    MaterialChange,
}

/// A committed "notify" decision.
///
/// The store already holds the new candle and time. Pass the ticket back
/// to [`DedupEngine::confirm`] after delivery or [`DedupEngine::rollback`]
/// if delivery failed.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyTicket {
    pub symbol: String,
    pub reason: NotifyReason,
    pub candle: Candle,
    pub notified_at: DateTime<Utc>,
    /// Record as it was before this decision.
    pub previous: Option<NotificationRecord>,
}

impl NotifyTicket {
    /// Message from the previous notification, a candidate for editing.
    pub fn previous_handle(&self) -> Option<MessageHandle> {
        self.previous.as_ref().and_then(|r| r.message_handle)
    }
}

/// Outcome of one dedup decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// No significant candle; nothing to do.
    Skip,
    /// Same event as the last notification, still inside the cooldown.
    Suppress { elapsed: Duration, diff: CandleDiff },
    /// Notify; the store has been updated.
    Notify(NotifyTicket),
}

impl Decision {
    #[inline]
    pub fn is_notify(&self) -> bool {
        matches!(self, Decision::Notify(_))
    }
}

/// Combines the similarity comparator and the state store into per-symbol
/// notify/suppress decisions.
#[derive(Debug, Clone)]
pub struct DedupEngine {
    config: DedupConfig,
    comparator: SimilarityComparator,
    store: Arc<NotificationStateStore>,
}

impl DedupEngine {
    pub fn new(
        config: DedupConfig,
        comparator: SimilarityComparator,
        store: Arc<NotificationStateStore>,
    ) -> Self {
        Self {
            config,
            comparator,
            store,
        }
    }

    pub fn store(&self) -> &Arc<NotificationStateStore> {
        &self.store
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Decide whether `incoming` should be notified at `now`, and on
    /// "notify" record it in the store. Lookup, decision and update happen
    /// under one per-symbol lock.
    pub fn decide(&self, symbol: &str, incoming: Option<&Candle>, now: DateTime<Utc>) -> Decision {
        let Some(incoming) = incoming else {
            return Decision::Skip;
        };

        self.store.upsert(symbol, |slot| {
            let reason = match slot.as_ref() {
                None => NotifyReason::FirstSignal,
                Some(record) => {
                    let elapsed = now - record.last_notified_at;
                    if elapsed >= self.config.min_message_interval {
                        NotifyReason::CooldownExpired
                    } else {
                        let diff = CandleDiff::between(&record.last_candle, incoming);
                        if self.comparator.is_within(&diff) {
                            debug!(
                                symbol = symbol,
                                elapsed_secs = elapsed.num_seconds(),
                                change_diff = diff.change_diff,
                                volume_diff = diff.volume_diff,
                                "Suppressing similar candle inside cooldown"
                            );
                            return Decision::Suppress { elapsed, diff };
                        }
                        NotifyReason::MaterialChange
                    }
                }
            };

            let previous = slot.clone();
            let message_handle = previous.as_ref().and_then(|r| r.message_handle);
            let last_delivered = previous
                .as_ref()
                .and_then(NotificationRecord::delivered_state)
                .map(Box::new);
            *slot = Some(NotificationRecord {
                message_handle,
                last_delivered,
                ..NotificationRecord::new(incoming.clone(), now)
            });

            debug!(symbol = symbol, reason = ?reason, change = incoming.change(), "Notify decision");
            Decision::Notify(NotifyTicket {
                symbol: symbol.to_string(),
                reason,
                candle: incoming.clone(),
                notified_at: now,
                previous,
            })
        })
    }

    /// True if `incoming` should be notified; updates the store when it is.
    pub fn should_notify(&self, symbol: &str, incoming: Option<&Candle>, now: DateTime<Utc>) -> bool {
        self.decide(symbol, incoming, now).is_notify()
    }

    /// Record the delivered message for a notification.
    ///
    /// A newer record keeps its own message if it has one. If a later failed
    /// delivery rolled this notification back, it is reinstated.
    pub fn confirm(&self, ticket: &NotifyTicket, handle: MessageHandle) {
        let delivered = || {
            NotificationRecord::new(ticket.candle.clone(), ticket.notified_at).into_delivered(handle)
        };

        self.store.upsert(&ticket.symbol, |slot| {
            let rolled_back = slot
                .as_ref()
                .map_or(true, |r| r.last_notified_at < ticket.notified_at);
            if rolled_back {
                *slot = Some(delivered());
                return;
            }

            let Some(record) = slot.as_mut() else {
                return;
            };
            if record.last_notified_at == ticket.notified_at {
                record.message_handle = Some(handle);
                record.delivered = true;
                record.last_delivered = None;
                return;
            }

            // a newer decision replaced this one
            if record.message_handle.is_none() {
                record.message_handle = Some(handle);
            }
            let newer_fallback = record
                .last_delivered
                .as_ref()
                .map_or(true, |d| d.last_notified_at < ticket.notified_at);
            if !record.delivered && newer_fallback {
                record.last_delivered = Some(Box::new(delivered()));
            }
        });
    }

    /// Undo a notification whose delivery failed, so the symbol is not
    /// considered "already notified". The store falls back to the latest
    /// delivered record, skipping undelivered ones. A no-op if a later
    /// decision has replaced the record.
    pub fn rollback(&self, ticket: &NotifyTicket) -> bool {
        self.store.upsert(&ticket.symbol, |slot| {
            let is_current = slot
                .as_ref()
                .map(|r| r.last_notified_at == ticket.notified_at && r.last_candle == ticket.candle)
                .unwrap_or(false);
            if is_current {
                *slot = slot.take().and_then(|r| r.last_delivered).map(|r| *r);
            }
            is_current
        })
    }
}
