//! Core data types for the candle move alert bot.

pub mod candle;
pub mod notification;
pub mod symbol;
pub mod timeframe;

pub use candle::*;
pub use notification::*;
pub use symbol::*;
pub use timeframe::*;
