//! Market data collection from exchanges.
//!
//! ## Architecture
//!
//! - `source` - `MarketDataSource` trait, `CandleFetcher` adapter and `FetchOutcome`
//! - `rest` - Exchange REST kline fetchers
//! - `error` - `FeedError`

pub mod error;
pub mod rest;
pub mod source;

pub use error::*;
pub use rest::*;
pub use source::*;
