//! Telegram alerts for significant candle moves.
//!
//! This crate provides:
//! - Transport abstraction with a Telegram implementation and a mock
//! - Edit-then-send delivery of notifications
//! - The per-pass and on-demand notification flow

pub mod dispatcher;
pub mod message;
pub mod notifier;
pub mod telegram;
pub mod transport;

pub use dispatcher::{Delivery, NotificationDispatcher};
pub use notifier::{Notifier, NotifierConfig, PassReport, QueryOutcome, SymbolOutcome};
pub use telegram::{Command, TelegramBot, TelegramError};
pub use transport::{ActionButton, DispatchError, MockTransport, NotificationTransport, SentMessage};
