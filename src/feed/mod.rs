//! Price feed abstraction for fetching spot prices per market.

use crate::domain::Decimal;
use async_trait::async_trait;
use std::fmt;

pub mod binance;
pub mod mock;

pub use binance::BinancePriceFeed;
pub use mock::MockPriceFeed;

/// Source of live spot prices.
///
/// Implementations handle retry/backoff themselves; a missing quote is `Ok(None)`.
#[async_trait]
pub trait PriceFeed: Send + Sync + fmt::Debug {
    /// Fetch the current price for a feed symbol (e.g. "BTCUSDT").
    async fn fetch_price(&self, symbol: &str) -> Result<Option<Decimal>, FeedError>;
}

/// Error type for price feed operations.
#[derive(Debug, Clone)]
pub enum FeedError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded (caller should implement backoff)
    RateLimited,
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            FeedError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            FeedError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            FeedError::RateLimited => write!(f, "Rate limited"),
        }
    }
}

impl std::error::Error for FeedError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_display() {
        let err = FeedError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = FeedError::HttpError {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        let err = FeedError::ParseError("invalid JSON".to_string());
        assert_eq!(err.to_string(), "Parse error: invalid JSON");

        assert_eq!(FeedError::RateLimited.to_string(), "Rate limited");
    }
}
