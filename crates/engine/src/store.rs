//! Per-symbol notification state.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use movewatch_core::{Candle, MessageHandle};

/// What was last sent for a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRecord {
    pub symbol: CompactString,
    /// When the last notification decision was taken.
    pub last_notified_at: DateTime<Utc>,
    /// Candle the last notification was about.
    pub last_candle: Candle,
    /// Delivered message, once the dispatcher has one.
    pub message_handle: Option<MessageHandle>,
    /// True once delivery of this notification has been confirmed.
    pub delivered: bool,
    /// Most recent delivered record this one replaced, while this one is
    /// still undelivered.
    pub last_delivered: Option<Box<NotificationRecord>>,
}

impl NotificationRecord {
    pub fn new(candle: Candle, notified_at: DateTime<Utc>) -> Self {
        Self {
            symbol: CompactString::new(candle.symbol()),
            last_notified_at: notified_at,
            last_candle: candle,
            message_handle: None,
            delivered: false,
            last_delivered: None,
        }
    }

    /// This record marked as delivered through `handle`.
    pub fn into_delivered(self, handle: MessageHandle) -> Self {
        Self {
            message_handle: Some(handle),
            delivered: true,
            last_delivered: None,
            ..self
        }
    }

    /// The latest delivered state at or before this record.
    pub fn delivered_state(&self) -> Option<NotificationRecord> {
        if self.delivered {
            Some(self.clone())
        } else {
            self.last_delivered.as_deref().cloned()
        }
    }
}

/// Process-wide map of symbol to [`NotificationRecord`].
///
/// `upsert` holds the shard lock for the symbol for the whole mutator call,
/// so read-decide-write sequences for one symbol never interleave. Other
/// symbols are unaffected.
#[derive(Debug, Default)]
pub struct NotificationStateStore {
    records: DashMap<CompactString, NotificationRecord>,
}

impl NotificationStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the record for a symbol.
    pub fn get(&self, symbol: &str) -> Option<NotificationRecord> {
        self.records.get(symbol).map(|r| r.value().clone())
    }

    /// Atomic read-modify-write for one symbol.
    ///
    /// The mutator sees the current record (or None) and may replace,
    /// modify, or clear it. Clearing is only used to undo a first
    /// notification whose delivery failed.
    pub fn upsert<R>(
        &self,
        symbol: &str,
        mutator: impl FnOnce(&mut Option<NotificationRecord>) -> R,
    ) -> R {
        match self.records.entry(CompactString::new(symbol)) {
            Entry::Occupied(mut entry) => {
                let mut slot = Some(entry.get().clone());
                let out = mutator(&mut slot);
                match slot {
                    Some(record) => {
                        entry.insert(record);
                    }
                    None => {
                        entry.remove();
                    }
                }
                out
            }
            Entry::Vacant(entry) => {
                let mut slot = None;
                let out = mutator(&mut slot);
                if let Some(record) = slot {
                    entry.insert(record);
                }
                out
            }
        }
    }

    /// Attach a delivered message to a symbol's record.
    /// Returns false if the symbol has no record.
    pub fn set_message_handle(&self, symbol: &str, handle: MessageHandle) -> bool {
        match self.records.get_mut(symbol) {
            Some(mut record) => {
                record.message_handle = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Number of symbols with a record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use movewatch_core::Ohlcv;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn candle(symbol: &str, close: f64) -> Candle {
        let t = Utc.with_ymd_and_hms(2026, 2, 2, 10, 0, 0).unwrap();
        Candle::from_ohlcv(symbol, Ohlcv::new(t, 100.0, 110.0, 90.0, close, 1000.0)).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_empty_store() {
        let store = NotificationStateStore::new();
        assert!(store.is_empty());
        assert!(store.get("ADA").is_none());
        assert!(!store.set_message_handle("ADA", MessageHandle::new(1, 1)));
    }

    #[test]
    fn test_upsert_inserts_and_updates_in_place() {
        let store = NotificationStateStore::new();

        store.upsert("ADA", |slot| {
            assert!(slot.is_none());
            *slot = Some(NotificationRecord::new(candle("ADA", 102.0), at(0)));
        });
        assert_eq!(store.len(), 1);

        let seen = store.upsert("ADA", |slot| {
            let record = slot.as_mut().unwrap();
            record.last_notified_at = at(60);
            record.last_candle.change()
        });
        assert!((seen - 2.0).abs() < 1e-9);

        let record = store.get("ADA").unwrap();
        assert_eq!(record.last_notified_at, at(60));
        assert_eq!(record.symbol, "ADA");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_upsert_without_change_keeps_state() {
        let store = NotificationStateStore::new();
        store.upsert("ETH", |_| ());
        assert!(store.is_empty());

        store.upsert("ETH", |slot| {
            *slot = Some(NotificationRecord::new(candle("ETH", 95.0), at(0)))
        });
        let before = store.get("ETH");
        store.upsert("ETH", |_| ());
        assert_eq!(store.get("ETH"), before);
    }

    #[test]
    fn test_upsert_can_clear() {
        let store = NotificationStateStore::new();
        store.upsert("SUI", |slot| {
            *slot = Some(NotificationRecord::new(candle("SUI", 105.0), at(0)))
        });
        store.upsert("SUI", |slot| *slot = None);
        assert!(store.get("SUI").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_message_handle() {
        let store = NotificationStateStore::new();
        store.upsert("INJ", |slot| {
            *slot = Some(NotificationRecord::new(candle("INJ", 103.0), at(0)))
        });
        assert!(store.set_message_handle("INJ", MessageHandle::new(-5, 77)));
        assert_eq!(
            store.get("INJ").unwrap().message_handle,
            Some(MessageHandle::new(-5, 77))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_writers_insert_once() {
        let store = Arc::new(NotificationStateStore::new());
        let mut handles = Vec::new();

        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.upsert("ADA", |slot| {
                    if slot.is_none() {
                        *slot = Some(NotificationRecord::new(candle("ADA", 102.0), at(i)));
                        true
                    } else {
                        false
                    }
                })
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.len(), 1);
    }
}
