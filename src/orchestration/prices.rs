//! Live price map, polled from the feed for every market.

use crate::domain::normalize::{normalize_amount, PRICE_DECIMALS};
use crate::domain::{Decimal, Market, MarketIdx};
use crate::feed::PriceFeed;
use crate::orchestration::last_of_calls::{LastOfCalls, Outcome};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Latest known price per market, 8 decimals, rounded down.
#[derive(Debug, Default)]
pub struct PriceBook {
    prices: RwLock<HashMap<MarketIdx, Decimal>>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn price(&self, idx: MarketIdx) -> Option<Decimal> {
        self.prices.read().await.get(&idx).copied()
    }

    /// Price as the vault expects it (8-decimal integer).
    pub async fn price_normalized(&self, idx: MarketIdx) -> Option<u128> {
        let price = self.price(idx).await?;
        normalize_amount(price, PRICE_DECIMALS)?.to_u128()
    }

    pub async fn snapshot(&self) -> HashMap<MarketIdx, Decimal> {
        self.prices.read().await.clone()
    }

    pub async fn set(&self, idx: MarketIdx, price: Decimal) {
        self.prices
            .write()
            .await
            .insert(idx, price.round_down(PRICE_DECIMALS));
    }
}

pub struct PricePoller {
    feed: Arc<dyn PriceFeed>,
    book: Arc<PriceBook>,
    guard: LastOfCalls,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl PricePoller {
    pub fn new(feed: Arc<dyn PriceFeed>, book: Arc<PriceBook>, interval: Duration) -> Self {
        Self {
            feed,
            book,
            guard: LastOfCalls::new(),
            interval,
            task: Mutex::new(None),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    pub fn book(&self) -> &Arc<PriceBook> {
        &self.book
    }

    /// Fetch every market once and merge the results.
    ///
    /// A market whose fetch fails or yields nothing keeps its previous price.
    /// Skipped if a newer poll started before this one finished.
    pub async fn sync_all_prices(&self) -> Outcome<usize> {
        let ticket = self.guard.begin();

        let fetches = Market::ALL.iter().map(|market| async move {
            let result = self.feed.fetch_price(market.feed_symbol()).await;
            (*market, result)
        });
        let results = join_all(fetches).await;

        let mut prices = self.book.prices.write().await;
        if !self.guard.is_current(ticket) {
            debug!("Price poll superseded");
            return Outcome::Skipped;
        }

        let mut updated = 0;
        for (market, result) in results {
            match result {
                Ok(Some(price)) => {
                    prices.insert(market.idx(), price.round_down(PRICE_DECIMALS));
                    updated += 1;
                }
                Ok(None) => debug!(symbol = market.feed_symbol(), "No price returned"),
                Err(e) => warn!(symbol = market.feed_symbol(), error = %e, "Price fetch failed"),
            }
        }
        Outcome::Applied(updated)
    }

    /// Clear the map and restart polling; the first poll runs immediately.
    ///
    /// Every tick starts its own poll, so a hung fetch never holds back the
    /// next one. Out-of-order results are dropped by the guard.
    pub async fn resync(self: &Arc<Self>) {
        self.stop();
        self.guard.cancel_all();
        self.book.prices.write().await.clear();

        let poller = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poller.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let poll = Arc::clone(&poller);
                poller.track(tokio::spawn(async move {
                    poll.sync_all_prices().await;
                }));
            }
        });
        *self.task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Stop the loop and abort every poll still waiting on the feed.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
        for handle in self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).drain(..) {
            handle.abort();
        }
    }

    /// Polls still running.
    pub fn in_flight(&self) -> usize {
        let mut polls = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        polls.retain(|h| !h.is_finished());
        polls.len()
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut polls = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        polls.retain(|h| !h.is_finished());
        polls.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FeedError, MockPriceFeed};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[tokio::test]
    async fn test_prices_rounded_down_to_eight_decimals() {
        let feed = MockPriceFeed::new().with_price("BTCUSDT", d("30000.123456789"));
        let poller = PricePoller::new(Arc::new(feed), Arc::new(PriceBook::new()), Duration::from_secs(5));

        assert_eq!(poller.sync_all_prices().await, Outcome::Applied(1));
        assert_eq!(poller.book().price(MarketIdx(1)).await, Some(d("30000.12345678")));
        assert_eq!(
            poller.book().price_normalized(MarketIdx(1)).await,
            Some(3_000_012_345_678)
        );
        assert_eq!(poller.book().price(MarketIdx(2)).await, None);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_price() {
        let feed = MockPriceFeed::new()
            .with_delayed("ETHUSDT", Duration::ZERO, Some(d("2000")))
            .with_error("ETHUSDT", FeedError::RateLimited)
            .with_delayed("ETHUSDT", Duration::ZERO, None);
        let poller = PricePoller::new(Arc::new(feed), Arc::new(PriceBook::new()), Duration::from_secs(5));

        poller.sync_all_prices().await;
        poller.sync_all_prices().await;
        poller.sync_all_prices().await;
        assert_eq!(poller.book().price(MarketIdx(2)).await, Some(d("2000")));
    }
}
