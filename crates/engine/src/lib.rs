//! Significant move detection and alert deduplication engine.
//!
//! This crate decides, from a stream of candles, when a symbol deserves a
//! notification and keeps the per-symbol notification state that drives
//! deduplication.

pub mod dedup;
pub mod significance;
pub mod similarity;
pub mod store;

pub use dedup::*;
pub use significance::*;
pub use similarity::*;
pub use store::*;
