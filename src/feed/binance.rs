//! Binance spot average-price client.

use super::{FeedError, PriceFeed};
use crate::domain::Decimal;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Price feed backed by the public `avgPrice` endpoint.
#[derive(Debug, Clone)]
pub struct BinancePriceFeed {
    client: Client,
    base_url: String,
    max_elapsed: Duration,
}

impl BinancePriceFeed {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            max_elapsed: Duration::from_secs(4),
        }
    }

    async fn get_avg_price(&self, symbol: &str) -> Result<serde_json::Value, FeedError> {
        let url = format!("{}/api/v3/avgPrice", self.base_url);
        // Bounded below the poll interval so a slow feed never stacks retries across polls.
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .query(&[("symbol", symbol)])
                .send()
                .await
                .map_err(|e| backoff::Error::transient(FeedError::NetworkError(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(FeedError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(FeedError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(FeedError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(FeedError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl PriceFeed for BinancePriceFeed {
    async fn fetch_price(&self, symbol: &str) -> Result<Option<Decimal>, FeedError> {
        debug!(symbol, "Fetching average price");
        let response = self.get_avg_price(symbol).await?;
        parse_avg_price(&response)
    }
}

/// Extract `price` from an avgPrice response. A missing field is "no quote".
fn parse_avg_price(response: &serde_json::Value) -> Result<Option<Decimal>, FeedError> {
    match response.get("price").and_then(|v| v.as_str()) {
        Some(raw) => Decimal::from_str_canonical(raw)
            .map(Some)
            .map_err(|e| FeedError::ParseError(format!("Invalid price: {}", e))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_avg_price_valid() {
        let json = serde_json::json!({"mins": 5, "price": "30123.45678912", "closeTime": 1});
        let price = parse_avg_price(&json).unwrap();
        assert_eq!(price, Some(Decimal::from_str_canonical("30123.45678912").unwrap()));
    }

    #[test]
    fn test_parse_avg_price_missing_is_none() {
        let json = serde_json::json!({"code": -1121, "msg": "Invalid symbol."});
        assert_eq!(parse_avg_price(&json).unwrap(), None);
    }

    #[test]
    fn test_parse_avg_price_garbage_is_error() {
        let json = serde_json::json!({"price": "not-a-number"});
        assert!(matches!(parse_avg_price(&json), Err(FeedError::ParseError(_))));
    }
}
