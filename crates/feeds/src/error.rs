//! Error types for market data operations.

use thiserror::Error;

/// Errors that can occur while fetching candles.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("No candle data for {0}")]
    NoData(String),

    #[error("Instrument not supported: {0}")]
    UnsupportedInstrument(String),

    #[error("Exchange rejected request ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::ParseError(err.to_string())
        } else {
            FeedError::ConnectionFailed(err.to_string())
        }
    }
}

impl FeedError {
    /// Returns true if this error is transient and the next poll will likely succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FeedError::ConnectionFailed(_)
                | FeedError::NoData(_)
                | FeedError::Timeout(_)
                | FeedError::RateLimitExceeded
        )
    }

    /// Returns true if this error needs manual intervention (bad credentials,
    /// unknown instrument) and will repeat on every poll.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            FeedError::AuthenticationFailed(_) | FeedError::UnsupportedInstrument(_)
        )
    }
}
