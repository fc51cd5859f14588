//! Mock price feed for testing without network calls.

use super::{FeedError, PriceFeed};
use crate::domain::Decimal;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// One scripted answer: wait `delay`, then return `price`.
#[derive(Debug, Clone)]
struct Scripted {
    delay: Duration,
    price: Result<Option<Decimal>, FeedError>,
}

/// Mock feed returning fixed prices, or scripted responses consumed in call order.
#[derive(Debug, Default)]
pub struct MockPriceFeed {
    fixed: HashMap<String, Decimal>,
    scripted: Mutex<HashMap<String, VecDeque<Scripted>>>,
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `price` for `symbol` once the script for it is exhausted.
    pub fn with_price(mut self, symbol: &str, price: Decimal) -> Self {
        self.fixed.insert(symbol.to_string(), price);
        self
    }

    /// Queue a response for `symbol` that resolves after `delay`.
    pub fn with_delayed(self, symbol: &str, delay: Duration, price: Option<Decimal>) -> Self {
        self.push(symbol, Scripted { delay, price: Ok(price) });
        self
    }

    /// Queue a failure for `symbol`.
    pub fn with_error(self, symbol: &str, error: FeedError) -> Self {
        self.push(
            symbol,
            Scripted {
                delay: Duration::ZERO,
                price: Err(error),
            },
        );
        self
    }

    fn push(&self, symbol: &str, entry: Scripted) {
        self.scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(symbol.to_string())
            .or_default()
            .push_back(entry);
    }
}

#[async_trait]
impl PriceFeed for MockPriceFeed {
    async fn fetch_price(&self, symbol: &str) -> Result<Option<Decimal>, FeedError> {
        let next = self
            .scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(symbol)
            .and_then(|queue| queue.pop_front());

        match next {
            Some(entry) => {
                if !entry.delay.is_zero() {
                    tokio::time::sleep(entry.delay).await;
                }
                entry.price
            }
            None => Ok(self.fixed.get(symbol).copied()),
        }
    }
}
